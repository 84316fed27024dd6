use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::{not_found, ApiError, AppState};
use crate::api::dto::TransactionDto;

pub async fn latest(State(state): State<AppState>) -> Result<Json<Vec<TransactionDto>>, ApiError> {
    let rows = state.store.latest_transactions(state.config.trans_per_page as i64).await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let height = block_height_of(&state, &row).await?;
        out.push(TransactionDto::from_row(row, height));
    }
    Ok(Json(out))
}

pub async fn by_txid(State(state): State<AppState>, Path(txid): Path<String>) -> Result<Response, ApiError> {
    let Ok(txid) = hex::decode(&txid) else { return Ok(not_found()) };
    match state.store.transaction_by_txid(&txid).await? {
        Some(row) => {
            let height = block_height_of(&state, &row).await?;
            Ok(Json(TransactionDto::from_row(row, height)).into_response())
        }
        None => Ok(not_found()),
    }
}

async fn block_height_of(
    state: &AppState,
    row: &crate::store::models::TransactionRow,
) -> Result<Option<i32>, ApiError> {
    let Some(block_id) = row.block_id else { return Ok(None) };
    let height: Option<i32> = sqlx::query_scalar::<_, i32>("SELECT height FROM blocks WHERE id = $1")
        .bind(block_id)
        .fetch_optional(state.store.pool())
        .await
        .map_err(crate::errors::IndexerError::Storage)?;
    Ok(height)
}
