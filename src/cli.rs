//! Command-line surface (spec §6): a `clap` derive parser standing in for
//! `original_source/manage.py`'s Flask-Script `Manager` commands
//! (`init_db`, `delete_highest_block`, `sync`).

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "indexer", about = "UTXO chain indexer")]
pub struct Cli {
    /// Path to the YAML config file (spec §6, §10.3).
    #[arg(long, default_value = "config.yml")]
    pub config: String,

    /// Overrides the configured `log_level` for this run.
    #[arg(long)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drops and recreates the schema (`original_source/manage.py::init_db`).
    InitDb,
    /// Runs the reorg check followed by the forward fetch pipeline to tip,
    /// then exits. The read-side query surface is a separate binary
    /// (`explorer-api`) and is not started here.
    Sync,
    /// Rolls the local tip back by exactly one block
    /// (`original_source/manage.py::delete_highest_block`).
    DeleteHighestBlock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sync_with_defaults() {
        let cli = Cli::parse_from(["indexer", "sync"]);
        assert_eq!(cli.config, "config.yml");
        assert!(cli.log_level.is_none());
        assert!(matches!(cli.command, Command::Sync));
    }

    #[test]
    fn parses_init_db_with_overrides() {
        let cli = Cli::parse_from(["indexer", "--config", "custom.yml", "--log-level", "debug", "init-db"]);
        assert_eq!(cli.config, "custom.yml");
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert!(matches!(cli.command, Command::InitDb));
    }

    #[test]
    fn parses_delete_highest_block() {
        let cli = Cli::parse_from(["indexer", "delete-highest-block"]);
        assert!(matches!(cli.command, Command::DeleteHighestBlock));
    }
}
