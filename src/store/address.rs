//! Address resolver (spec §4.3): idempotent get-or-create on `hash`.
//!
//! Grounded on `original_source/lincoln/models.py::Address.get_addr`. The
//! schema indexes `address.hash` uniquely on its own (§6), so the lookup
//! key is the raw payload alone; `version` is carried as an attribute, not
//! part of the uniqueness constraint.

use sqlx::{Postgres, Transaction};

use crate::errors::Result;
use crate::store::models::AddressRow;

/// Look up `(hash)`, inserting a zeroed row on first sight. Safe to call
/// many times per block (P8: idempotent, inserts at most once).
pub async fn get_addr(
    tx: &mut Transaction<'_, Postgres>,
    hash: &[u8],
    version: i16,
    currency: &str,
) -> Result<AddressRow> {
    let row = sqlx::query_as::<_, AddressRow>(
        "INSERT INTO addresses (hash, version, currency, total_in, total_out)
         VALUES ($1, $2, $3, 0, 0)
         ON CONFLICT (hash) DO UPDATE SET hash = addresses.hash
         RETURNING *",
    )
    .bind(hash)
    .bind(version)
    .bind(currency)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

/// Sets `first_seen_at` the first time an address is referenced by a
/// block, per §4.5 step 2b ("set `addr.first_seen_at` if null").
pub async fn mark_first_seen(
    tx: &mut Transaction<'_, Postgres>,
    hash: &[u8],
    seen_at: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    sqlx::query("UPDATE addresses SET first_seen_at = $1 WHERE hash = $2 AND first_seen_at IS NULL")
        .bind(seen_at)
        .bind(hash)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn add_totals(
    tx: &mut Transaction<'_, Postgres>,
    hash: &[u8],
    total_in_delta: rust_decimal::Decimal,
    total_out_delta: rust_decimal::Decimal,
) -> Result<()> {
    sqlx::query("UPDATE addresses SET total_in = total_in + $1, total_out = total_out + $2 WHERE hash = $3")
        .bind(total_in_delta)
        .bind(total_out_delta)
        .bind(hash)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn by_hash(pool: &sqlx::PgPool, hash: &[u8]) -> Result<Option<AddressRow>> {
    let row = sqlx::query_as::<_, AddressRow>("SELECT * FROM addresses WHERE hash = $1")
        .bind(hash)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// §6: "Prefix/substring match for address hash" (used by unified search).
/// Matches against the hex-encoded payload, since that's what a partial
/// address-hash query would plausibly look like typed out.
pub async fn by_hash_substring(
    pool: &sqlx::PgPool,
    substring: &str,
    limit: i64,
) -> Result<Vec<AddressRow>> {
    let pattern = format!("%{substring}%");
    let rows = sqlx::query_as::<_, AddressRow>(
        "SELECT * FROM addresses WHERE encode(hash, 'hex') LIKE $1 ORDER BY id LIMIT $2",
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn outputs_of_address(
    pool: &sqlx::PgPool,
    hash: &[u8],
    limit: i64,
    offset: i64,
) -> Result<Vec<crate::store::models::OutputRow>> {
    let rows = sqlx::query_as::<_, crate::store::models::OutputRow>(
        "SELECT * FROM outputs WHERE address_hash = $1 ORDER BY origin_tx_hash, index LIMIT $2 OFFSET $3",
    )
    .bind(hash)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlgoConfig, CoinServConfig, CurrencyConfig, Settings};
    use crate::processor::process_block;
    use crate::rpc::RpcClient;
    use crate::store::Store;
    use crate::types::{DecodedBlock, DecodedTransaction, DecodedTxOut, ScriptElement};
    use rust_decimal::Decimal;

    fn sample_settings() -> Settings {
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
            algo: AlgoConfig { display: "Quark".into() },
            database_url: String::new(),
            log_level: "INFO".into(),
            reorg_horizon: 150,
            outputs_per_page: 25,
            trans_per_page: 25,
            blocks_per_page: 25,
            search_result_limit: 25,
        }
    }

    fn p2pkh_script(hash: [u8; 20]) -> Vec<ScriptElement> {
        vec![
            ScriptElement::Op(0x76),
            ScriptElement::Op(0xa9),
            ScriptElement::Data(hash.to_vec()),
            ScriptElement::Op(0x88),
            ScriptElement::Op(0xac),
        ]
    }

    fn coinbase_tx(txid: [u8; 32], payout_hash: [u8; 20], value: i64) -> DecodedTransaction {
        DecodedTransaction {
            txid,
            is_coinbase: true,
            vin: vec![],
            vout: vec![DecodedTxOut { value, script_pubkey: p2pkh_script(payout_hash) }],
        }
    }

    // P5 (reorg round-trip) / §4.8 (aggregate reversal): deleting the tip
    // block undoes everything it contributed — the block and transaction
    // rows disappear, and the address row survives with its aggregates
    // reversed back to zero rather than being deleted (§4.8: "Addresses
    // are never deleted").
    #[sqlx::test(migrations = "./migrations")]
    async fn delete_block_cascade_reverses_address_and_block_totals(pool: sqlx::PgPool) {
        let store = Store { pool };
        let config = sample_settings();
        let rpc = RpcClient::new(&config.coinserv);
        let payout_hash = [0x77u8; 20];
        let amount = 2_500_000_000i64;
        let coinbase_txid = [0xddu8; 32];

        process_block(
            &store,
            &rpc,
            &config,
            1,
            DecodedBlock {
                hash: [3u8; 32],
                n_time: 1_600_000_000,
                difficulty: 1.0,
                transactions: vec![coinbase_tx(coinbase_txid, payout_hash, amount)],
            },
        )
        .await
        .unwrap();

        let addr_before = by_hash(store.pool(), &payout_hash).await.unwrap().unwrap();
        assert_eq!(addr_before.total_in, Decimal::new(amount, 8));

        let tip = store.local_tip().await.unwrap().unwrap();
        let mut txn = store.begin().await.unwrap();
        let removed_height = Store::delete_block_cascade(&mut txn, tip.id).await.unwrap();
        txn.commit().await.unwrap();
        assert_eq!(removed_height, 1);

        assert!(store.block_at_height(1).await.unwrap().is_none());
        assert!(store.transaction_by_txid(&coinbase_txid).await.unwrap().is_none());

        let addr_after = by_hash(store.pool(), &payout_hash).await.unwrap().unwrap();
        assert_eq!(addr_after.total_in, Decimal::ZERO);
        assert_eq!(addr_after.total_out, Decimal::ZERO);
    }
}
