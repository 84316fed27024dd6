//! Unified search (§6: "addresses → txs → blocks, short-circuiting on a
//! unique hit"). Query-type sniffing follows `search.rs::detect_query_type`
//! (numeric → height, 64 hex → hash/txid, else → address), generalized to
//! the base58check addresses this currency actually uses rather than a
//! hard-coded PIVX prefix check.

use axum::extract::{Path, State};
use axum::Json;

use super::AppState;
use crate::address_codec::decode_base58check;
use crate::api::dto::{BlockDto, SearchResult, TransactionDto};
use crate::store::address;

enum QueryKind {
    Height(i32),
    HashOrTxid(Vec<u8>),
    /// A hex string shorter than a full 32-byte hash/txid: §6's "prefix
    /// match for block hash and txid".
    HexPrefix(String),
    Address(Vec<u8>),
    Unknown,
}

fn classify(query: &str) -> QueryKind {
    let trimmed = query.trim();

    if let Ok(height) = trimmed.parse::<i32>() {
        return QueryKind::Height(height);
    }

    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        if trimmed.len() == 64 {
            if let Ok(bytes) = hex::decode(trimmed) {
                return QueryKind::HashOrTxid(bytes);
            }
        }
        return QueryKind::HexPrefix(trimmed.to_lowercase());
    }

    if let Ok((hash, _version)) = decode_base58check(trimmed) {
        return QueryKind::Address(hash);
    }

    QueryKind::Unknown
}

/// §7: storage errors on this route degrade to `NotFound` rather than an
/// HTTP 5xx, matching the read-side's error-handling carve-out.
pub async fn search(State(state): State<AppState>, Path(query): Path<String>) -> Json<SearchResult> {
    let result = run(&state, &query).await.unwrap_or(SearchResult::NotFound { query: query.clone() });
    Json(result)
}

/// §6: "unified search endpoint: addresses → txs → blocks,
/// short-circuiting on a unique hit" — each category is tried in that
/// order and the first non-empty match wins; a numeric query is an
/// unambiguous height and skips straight to blocks.
async fn run(state: &AppState, query: &str) -> crate::errors::Result<SearchResult> {
    let limit = state.config.search_result_limit as i64;
    match classify(query) {
        QueryKind::Height(height) => {
            if let Some(row) = state.store.block_at_height(height).await? {
                return Ok(SearchResult::Block(BlockDto::from(row)));
            }
        }
        QueryKind::HashOrTxid(bytes) => {
            if let Some(row) = address::by_hash(state.store.pool(), &bytes).await? {
                return Ok(SearchResult::Address(crate::api::dto::AddressDto::from(row)));
            }
            if let Some(row) = state.store.transaction_by_txid(&bytes).await? {
                return Ok(SearchResult::Transaction(tx_dto(state, row).await?));
            }
            if let Some(row) = state.store.block_by_hash(&bytes).await? {
                return Ok(SearchResult::Block(BlockDto::from(row)));
            }
        }
        QueryKind::HexPrefix(prefix) => {
            if let Some(row) = address::by_hash_substring(state.store.pool(), &prefix, limit).await?.into_iter().next()
            {
                return Ok(SearchResult::Address(crate::api::dto::AddressDto::from(row)));
            }
            if let Some(row) = state.store.transactions_by_txid_prefix(&prefix, limit).await?.into_iter().next() {
                return Ok(SearchResult::Transaction(tx_dto(state, row).await?));
            }
            if let Some(row) = state.store.blocks_by_hash_prefix(&prefix, limit).await?.into_iter().next() {
                return Ok(SearchResult::Block(BlockDto::from(row)));
            }
        }
        QueryKind::Address(hash) => {
            if let Some(row) = address::by_hash(state.store.pool(), &hash).await? {
                return Ok(SearchResult::Address(crate::api::dto::AddressDto::from(row)));
            }
        }
        QueryKind::Unknown => {}
    }
    Ok(SearchResult::NotFound { query: query.to_string() })
}

async fn tx_dto(state: &AppState, row: crate::store::models::TransactionRow) -> crate::errors::Result<TransactionDto> {
    let height = match row.block_id {
        Some(block_id) => {
            sqlx::query_scalar::<_, i32>("SELECT height FROM blocks WHERE id = $1")
                .bind(block_id)
                .fetch_optional(state.store.pool())
                .await?
        }
        None => None,
    };
    Ok(TransactionDto::from_row(row, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_numeric_as_height() {
        assert!(matches!(classify("12345"), QueryKind::Height(12345)));
    }

    #[test]
    fn classifies_64_hex_chars_as_hash_or_txid() {
        let hex_str = "a".repeat(64);
        assert!(matches!(classify(&hex_str), QueryKind::HashOrTxid(_)));
    }

    #[test]
    fn classifies_garbage_as_unknown() {
        assert!(matches!(classify("!!!not-a-real-query!!!"), QueryKind::Unknown));
    }

    #[test]
    fn classifies_short_hex_as_prefix() {
        assert!(matches!(classify("a1b2c3"), QueryKind::HexPrefix(_)));
    }
}
