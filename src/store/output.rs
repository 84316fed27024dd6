//! Output resolver (spec §4.4): the creation-side `get_output` and the
//! spend-side `get_input`, including the latter's RPC-backed re-index
//! fallback.
//!
//! Grounded on `original_source/lincoln/models.py::Output.get_output`/
//! `get_input` and `db_utils.py::get_output_from_txin`'s three-tier lookup.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use crate::config::Settings;
use crate::constants::satoshis_to_decimal;
use crate::errors::{IndexerError, Result};
use crate::rpc::RpcClient;
use crate::script;
use crate::store::address;
use crate::store::models::OutputRow;
use crate::types::{to_utc, ScriptType};

/// Creation side (§4.4): prefer the exact `(txid, index)` match; else
/// match on `(txid, amount)` and patch the index; else insert. Recovers
/// from earlier partial ingestions where `index` drifted.
///
/// Returns the row plus whether it was freshly inserted (vs. an existing
/// row located by either lookup tier) — `get_input`'s reindex path needs
/// this to know whether an address' `total_in` has already been credited
/// for this output (`db_utils.py::get_output_from_txin` only credits in
/// its `except NoResultFound` insert branch, never on a located row).
pub async fn get_output(
    tx: &mut Transaction<'_, Postgres>,
    txid: &[u8],
    amount: Decimal,
    index: i32,
) -> Result<(OutputRow, bool)> {
    if let Some(row) = exact_output(tx, txid, index).await? {
        return Ok((row, false));
    }

    let by_amount: Option<OutputRow> = sqlx::query_as(
        "SELECT * FROM outputs WHERE origin_tx_hash = $1 AND amount = $2 ORDER BY index LIMIT 1",
    )
    .bind(txid)
    .bind(amount)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(row) = by_amount {
        let patched = sqlx::query_as::<_, OutputRow>(
            "UPDATE outputs SET index = $1 WHERE origin_tx_hash = $2 AND index = $3 RETURNING *",
        )
        .bind(index)
        .bind(txid)
        .bind(row.index)
        .fetch_one(&mut **tx)
        .await?;
        return Ok((patched, false));
    }

    let inserted = sqlx::query_as::<_, OutputRow>(
        "INSERT INTO outputs (origin_tx_hash, index, amount, type, address_hash, spend_tx_id)
         VALUES ($1, $2, $3, $4, NULL, NULL)
         RETURNING *",
    )
    .bind(txid)
    .bind(index)
    .bind(amount)
    .bind(ScriptType::NonStandard.code())
    .fetch_one(&mut **tx)
    .await?;
    Ok((inserted, true))
}

pub async fn set_classification(
    tx: &mut Transaction<'_, Postgres>,
    txid: &[u8],
    index: i32,
    script_type: ScriptType,
    address_hash: Option<&[u8]>,
) -> Result<()> {
    sqlx::query("UPDATE outputs SET type = $1, address_hash = $2 WHERE origin_tx_hash = $3 AND index = $4")
        .bind(script_type.code())
        .bind(address_hash)
        .bind(txid)
        .bind(index)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn mark_spent(
    tx: &mut Transaction<'_, Postgres>,
    origin_tx_hash: &[u8],
    index: i32,
    spend_tx_id: i64,
) -> Result<()> {
    sqlx::query("UPDATE outputs SET spend_tx_id = $1 WHERE origin_tx_hash = $2 AND index = $3")
        .bind(spend_tx_id)
        .bind(origin_tx_hash)
        .bind(index)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn exact_output(
    tx: &mut Transaction<'_, Postgres>,
    origin_tx_hash: &[u8],
    index: i32,
) -> Result<Option<OutputRow>> {
    let row = sqlx::query_as::<_, OutputRow>(
        "SELECT * FROM outputs WHERE origin_tx_hash = $1 AND index = $2",
    )
    .bind(origin_tx_hash)
    .bind(index)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row)
}

/// Spend side (§4.4): exact match, else an RPC-backed re-index of the
/// origin transaction's block, else `MissingOutput`.
///
/// §11 supplement: the origin tx's block link is resolved from the
/// `transactions` table rather than re-walking the chain. If that link is
/// itself absent, reindexing is not attempted — bubbling `MissingOutput`
/// beats silently guessing a block.
pub async fn get_input(
    tx: &mut Transaction<'_, Postgres>,
    rpc: &RpcClient,
    config: &Settings,
    origin_tx_hash: &[u8],
    index: i32,
) -> Result<OutputRow> {
    if let Some(row) = exact_output(tx, origin_tx_hash, index).await? {
        return Ok(row);
    }

    let origin_tx: Option<(i64, Option<i64>)> =
        sqlx::query_as("SELECT id, block_id FROM transactions WHERE txid = $1")
            .bind(origin_tx_hash)
            .fetch_optional(&mut **tx)
            .await?;

    let block_id = match origin_tx {
        Some((_, Some(block_id))) => block_id,
        _ => {
            return Err(IndexerError::MissingOutput {
                origin_txid: hex::encode(origin_tx_hash),
                index,
            })
        }
    };

    let block_hash: Option<Vec<u8>> = sqlx::query_scalar("SELECT hash FROM blocks WHERE id = $1")
        .bind(block_id)
        .fetch_optional(&mut **tx)
        .await?;
    let Some(block_hash) = block_hash else {
        return Err(IndexerError::MissingOutput { origin_txid: hex::encode(origin_tx_hash), index });
    };
    let mut hash_array = [0u8; 32];
    hash_array.copy_from_slice(&block_hash);

    let decoded = rpc.get_block(hash_array).await?;
    let version_map = config.address_version_map();
    let ntime = to_utc(decoded.n_time);

    let origin_decoded = decoded.transactions.iter().find(|t| t.txid.as_slice() == origin_tx_hash);
    let Some(origin_decoded) = origin_decoded else {
        return Err(IndexerError::MissingOutput { origin_txid: hex::encode(origin_tx_hash), index });
    };

    for (i, vout) in origin_decoded.vout.iter().enumerate() {
        let amount = satoshis_to_decimal(vout.value);
        let (_, inserted) = get_output(tx, origin_tx_hash, amount, i as i32).await?;
        let classified = script::classify(&vout.script_pubkey);
        let address_hash = if let (Some(payload), Some(version)) =
            (&classified.address_payload, version_map.get(&classified.script_type.code()))
        {
            address::get_addr(tx, payload, *version as i16, &config.currency.code).await?;
            address::mark_first_seen(tx, payload, ntime).await?;
            // Only credit `total_in` when this output row is newly created:
            // `db_utils.py::get_output_from_txin` credits
            // `addr.total_in += out.amount` solely in its insert
            // (`except NoResultFound`) branch, never when the row already
            // existed. Crediting unconditionally would double-count a
            // partially-present origin tx's already-ingested outputs.
            if inserted {
                address::add_totals(tx, payload, amount, Decimal::ZERO).await?;
            }
            Some(payload.clone())
        } else {
            None
        };
        set_classification(tx, origin_tx_hash, i as i32, classified.script_type, address_hash.as_deref()).await?;
    }

    exact_output(tx, origin_tx_hash, index)
        .await?
        .ok_or_else(|| IndexerError::MissingOutput { origin_txid: hex::encode(origin_tx_hash), index })
}
