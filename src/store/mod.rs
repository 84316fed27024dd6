//! Persistence abstraction (spec §3, component 3): transactional commit and
//! rollback over Block/Transaction/Output/Address.
//!
//! The shape of the repository functions below — small, explicit, one
//! concern each — follows `original_source/lincoln/models.py`'s
//! `get_addr`/`get_output`/`get_input` and `db_utils.py`'s three-tier output
//! lookup, translated onto `sqlx`/Postgres. Transactional all-or-nothing
//! commit replaces an atomic RocksDB write-batch with a Postgres
//! transaction.

pub mod address;
pub mod models;
pub mod output;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::errors::Result;
use models::{BlockRow, TransactionRow};

const SCHEMA_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Clone)]
pub struct Store {
    // `pub(crate)` rather than private: `#[sqlx::test]` integration tests
    // in sibling modules (`processor`, `store::address`) construct a
    // `Store` directly from the pool sqlx hands them.
    pub(crate) pool: PgPool,
}

pub struct Tip {
    pub id: i64,
    pub height: i32,
    pub hash: Vec<u8>,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(5).connect(database_url).await?;
        Ok(Store { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// CLI `init-db`: drop-and-create schema (§6).
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS outputs, transactions, addresses, blocks CASCADE")
            .execute(&self.pool)
            .await?;
        for statement in SCHEMA_SQL.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Highest local block, or `None` on an empty store (§4.7 step 1).
    pub async fn local_tip(&self) -> Result<Option<Tip>> {
        let row: Option<(i64, i32, Vec<u8>)> =
            sqlx::query_as("SELECT id, height, hash FROM blocks ORDER BY height DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, height, hash)| Tip { id, height, hash }))
    }

    pub async fn block_at_height(&self, height: i32) -> Result<Option<BlockRow>> {
        let row = sqlx::query_as::<_, BlockRow>("SELECT * FROM blocks WHERE height = $1")
            .bind(height)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn block_by_hash(&self, hash: &[u8]) -> Result<Option<BlockRow>> {
        let row = sqlx::query_as::<_, BlockRow>("SELECT * FROM blocks WHERE hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// §6: "prefix match for block hash" (used by unified search). `prefix`
    /// is the lowercase hex-encoded prefix the caller typed.
    pub async fn blocks_by_hash_prefix(&self, prefix_hex: &str, limit: i64) -> Result<Vec<BlockRow>> {
        let pattern = format!("{prefix_hex}%");
        let rows = sqlx::query_as::<_, BlockRow>(
            "SELECT * FROM blocks WHERE encode(hash, 'hex') LIKE $1 ORDER BY height DESC LIMIT $2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn latest_blocks(&self, limit: i64) -> Result<Vec<BlockRow>> {
        let rows = sqlx::query_as::<_, BlockRow>("SELECT * FROM blocks ORDER BY height DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// §4.5 step 1: create the block row with zeroed aggregates.
    pub async fn insert_block(
        tx: &mut Transaction<'_, Postgres>,
        hash: &[u8],
        height: i32,
        ntime: DateTime<Utc>,
        difficulty: f64,
        currency: &str,
        algo: &str,
    ) -> Result<BlockRow> {
        let row = sqlx::query_as::<_, BlockRow>(
            "INSERT INTO blocks (hash, height, ntime, difficulty, currency, algo, orphan, total_in, total_out)
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, 0, 0)
             RETURNING *",
        )
        .bind(hash)
        .bind(height)
        .bind(ntime)
        .bind(difficulty)
        .bind(currency)
        .bind(algo)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    pub async fn add_block_totals(
        tx: &mut Transaction<'_, Postgres>,
        block_id: i64,
        total_in_delta: Decimal,
        total_out_delta: Decimal,
    ) -> Result<()> {
        sqlx::query("UPDATE blocks SET total_in = total_in + $1, total_out = total_out + $2 WHERE id = $3")
            .bind(total_in_delta)
            .bind(total_out_delta)
            .bind(block_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// §4.5 step 2a: `get_or_create(txid, block)`. If the txid already
    /// exists (possible pre-BIP30 duplicate, §4.5 edge case), rebind it to
    /// the new block and zero its aggregates — the overwrite is deliberate.
    pub async fn get_or_create_transaction(
        tx: &mut Transaction<'_, Postgres>,
        txid: &[u8],
        block_id: i64,
    ) -> Result<TransactionRow> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "INSERT INTO transactions (txid, block_id, coinbase, total_in, total_out, network_fee)
             VALUES ($1, $2, FALSE, 0, 0, NULL)
             ON CONFLICT (txid) DO UPDATE SET
                block_id = EXCLUDED.block_id,
                coinbase = FALSE,
                total_in = 0,
                total_out = 0,
                network_fee = NULL
             RETURNING *",
        )
        .bind(txid)
        .bind(block_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    pub async fn add_transaction_totals(
        tx: &mut Transaction<'_, Postgres>,
        tx_id: i64,
        total_in_delta: Decimal,
        total_out_delta: Decimal,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE transactions SET total_in = total_in + $1, total_out = total_out + $2 WHERE id = $3",
        )
        .bind(total_in_delta)
        .bind(total_out_delta)
        .bind(tx_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn mark_coinbase(tx: &mut Transaction<'_, Postgres>, tx_id: i64) -> Result<()> {
        sqlx::query("UPDATE transactions SET coinbase = TRUE WHERE id = $1")
            .bind(tx_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// §9 Open Questions: `network_fee = total_in - total_out` for
    /// non-coinbase transactions, computed once the full set of inputs and
    /// outputs for the transaction is known.
    pub async fn set_network_fee(
        tx: &mut Transaction<'_, Postgres>,
        tx_id: i64,
        fee: Decimal,
    ) -> Result<()> {
        sqlx::query("UPDATE transactions SET network_fee = $1 WHERE id = $2")
            .bind(fee)
            .bind(tx_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn transaction_by_txid(&self, txid: &[u8]) -> Result<Option<TransactionRow>> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE txid = $1")
            .bind(txid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn latest_transactions(&self, limit: i64) -> Result<Vec<TransactionRow>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions ORDER BY id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// §6: "prefix match for ... txid" (used by unified search).
    pub async fn transactions_by_txid_prefix(&self, prefix_hex: &str, limit: i64) -> Result<Vec<TransactionRow>> {
        let pattern = format!("{prefix_hex}%");
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE encode(txid, 'hex') LIKE $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// §4.8: reverse every cached aggregate a block contributed, then
    /// delete it. Returns the deleted block's height so the reorg
    /// controller can continue walking back.
    ///
    /// Two passes, since a transaction in this block can be on either side
    /// of a spend relationship: it may have consumed outputs created by an
    /// *earlier, still-present* block (the input side, reversed in pass 1
    /// by un-spending those outputs), and its own outputs may have been
    /// consumed by a transaction in a *later* block — but the reorg
    /// controller always walks from the tip down, so that later block (and
    /// its spend) was already undone in a prior call before this one runs.
    pub async fn delete_block_cascade(tx: &mut Transaction<'_, Postgres>, block_id: i64) -> Result<i32> {
        let block: BlockRow = sqlx::query_as("SELECT * FROM blocks WHERE id = $1")
            .bind(block_id)
            .fetch_one(&mut **tx)
            .await?;

        let tx_rows: Vec<TransactionRow> =
            sqlx::query_as("SELECT * FROM transactions WHERE block_id = $1")
                .bind(block_id)
                .fetch_all(&mut **tx)
                .await?;

        // Pass 1: un-spend whatever this block's transactions consumed.
        for tx_row in &tx_rows {
            let spent: Vec<(Vec<u8>, i32, Decimal, Option<Vec<u8>>)> = sqlx::query_as(
                "SELECT origin_tx_hash, index, amount, address_hash FROM outputs WHERE spend_tx_id = $1",
            )
            .bind(tx_row.id)
            .fetch_all(&mut **tx)
            .await?;

            for (origin_hash, index, amount, address_hash) in spent {
                if let Some(addr_hash) = &address_hash {
                    sqlx::query("UPDATE addresses SET total_out = total_out - $1 WHERE hash = $2")
                        .bind(amount)
                        .bind(addr_hash)
                        .execute(&mut **tx)
                        .await?;
                }
                sqlx::query(
                    "UPDATE outputs SET spend_tx_id = NULL WHERE origin_tx_hash = $1 AND index = $2",
                )
                .bind(&origin_hash)
                .bind(index)
                .execute(&mut **tx)
                .await?;
            }
        }

        // Pass 2: remove the outputs this block's transactions created,
        // reverse the block aggregates, then delete the rows themselves.
        for tx_row in &tx_rows {
            // Addresses that received these outputs lose the corresponding
            // total_in — computed while the output rows still exist, since
            // the aggregate below reads from them.
            sqlx::query(
                "UPDATE addresses SET total_in = total_in - sub.amount
                 FROM (SELECT address_hash, SUM(amount) AS amount FROM outputs
                       WHERE origin_tx_hash = $1 AND address_hash IS NOT NULL
                       GROUP BY address_hash) AS sub
                 WHERE addresses.hash = sub.address_hash",
            )
            .bind(&tx_row.txid)
            .execute(&mut **tx)
            .await?;

            sqlx::query("DELETE FROM outputs WHERE origin_tx_hash = $1")
                .bind(&tx_row.txid)
                .execute(&mut **tx)
                .await?;

            sqlx::query("UPDATE blocks SET total_in = total_in - $1, total_out = total_out - $2 WHERE id = $3")
                .bind(tx_row.total_in)
                .bind(tx_row.total_out)
                .bind(block_id)
                .execute(&mut **tx)
                .await?;
            sqlx::query("DELETE FROM transactions WHERE id = $1")
                .bind(tx_row.id)
                .execute(&mut **tx)
                .await?;
        }

        sqlx::query("DELETE FROM blocks WHERE id = $1")
            .bind(block_id)
            .execute(&mut **tx)
            .await?;

        Ok(block.height)
    }
}
