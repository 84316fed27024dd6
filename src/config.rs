//! Typed configuration, loaded once at startup (spec §6, §10.3).
//!
//! A global `OnceCell<Settings>` set once at process startup, backed by a
//! typed `Settings` struct deserialized straight off the YAML document.

use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::collections::HashMap;

use crate::constants::DEFAULT_REORG_HORIZON;
use crate::errors::{IndexerError, Result};
use crate::types::ScriptType;

static GLOBAL_CONFIG: OnceCell<Settings> = OnceCell::new();

#[derive(Debug, Clone, Deserialize)]
pub struct CoinServConfig {
    pub username: String,
    pub password: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub remote: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyConfig {
    pub code: String,
    pub name: String,
    pub p2sh_address_version: u8,
    pub p2pkh_address_version: u8,
    pub p2pk_address_version: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlgoConfig {
    pub display: String,
}

fn default_reorg_horizon() -> i32 {
    DEFAULT_REORG_HORIZON
}

fn default_log_level() -> String {
    "INFO".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub coinserv: CoinServConfig,
    pub currency: CurrencyConfig,
    pub algo: AlgoConfig,
    pub database_url: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// REDESIGN FLAGS / §9 Open Questions: hard-coded 150 in the original,
    /// now configurable.
    #[serde(default = "default_reorg_horizon")]
    pub reorg_horizon: i32,

    pub outputs_per_page: u32,
    pub trans_per_page: u32,
    pub blocks_per_page: u32,
    pub search_result_limit: u32,
}

impl Settings {
    /// §11: resolve `currency.{p2sh,p2pkh,p2pk}_address_version` once into
    /// a lookup keyed by `type_code`, instead of re-reading config per output.
    pub fn address_version_map(&self) -> HashMap<i16, u8> {
        let mut map = HashMap::with_capacity(3);
        map.insert(ScriptType::P2sh.code(), self.currency.p2sh_address_version);
        map.insert(ScriptType::P2pkh.code(), self.currency.p2pkh_address_version);
        map.insert(ScriptType::P2pk.code(), self.currency.p2pk_address_version);
        map
    }
}

/// Load YAML config from `path` and install it as the process-wide global.
/// Must be called exactly once, before any code calls [`get_global_config`].
pub fn init_global_config(path: &str) -> Result<()> {
    let raw = config::Config::builder()
        .add_source(config::File::new(path, config::FileFormat::Yaml))
        .build()?;
    let settings: Settings = raw.try_deserialize().map_err(IndexerError::Config)?;
    GLOBAL_CONFIG
        .set(settings)
        .map_err(|_| IndexerError::Decode("config already initialized".to_string()))?;
    Ok(())
}

pub fn get_global_config() -> &'static Settings {
    GLOBAL_CONFIG.get().unwrap_or_else(|| {
        eprintln!("FATAL: config not initialized - call init_global_config() first");
        std::process::exit(1);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Settings {
        Settings {
            coinserv: CoinServConfig {
                username: "user".into(),
                password: "pass".into(),
                address: "127.0.0.1".into(),
                port: 51473,
                remote: false,
            },
            currency: CurrencyConfig {
                code: "PIVX".into(),
                name: "PIVX".into(),
                p2sh_address_version: 13,
                p2pkh_address_version: 30,
                p2pk_address_version: 30,
            },
            algo: AlgoConfig {
                display: "Quark".into(),
            },
            database_url: "postgres://localhost/pivxdex".into(),
            log_level: "INFO".into(),
            reorg_horizon: 150,
            outputs_per_page: 25,
            trans_per_page: 25,
            blocks_per_page: 25,
            search_result_limit: 25,
        }
    }

    #[test]
    fn address_version_map_covers_all_standard_types() {
        let map = sample().address_version_map();
        assert_eq!(map.get(&ScriptType::P2sh.code()), Some(&13));
        assert_eq!(map.get(&ScriptType::P2pkh.code()), Some(&30));
        assert_eq!(map.get(&ScriptType::P2pk.code()), Some(&30));
        assert_eq!(map.len(), 3);
    }
}
