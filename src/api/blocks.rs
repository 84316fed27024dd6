use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::{not_found, ApiError, AppState};
use crate::api::dto::BlockDto;

pub async fn latest(State(state): State<AppState>) -> Result<Json<Vec<BlockDto>>, ApiError> {
    let rows = state.store.latest_blocks(state.config.blocks_per_page as i64).await?;
    Ok(Json(rows.into_iter().map(BlockDto::from).collect()))
}

pub async fn by_height(State(state): State<AppState>, Path(height): Path<i32>) -> Result<Response, ApiError> {
    match state.store.block_at_height(height).await? {
        Some(row) => Ok(Json(BlockDto::from(row)).into_response()),
        None => Ok(not_found()),
    }
}

pub async fn by_hash(State(state): State<AppState>, Path(hash): Path<String>) -> Result<Response, ApiError> {
    let Ok(hash) = hex::decode(&hash) else { return Ok(not_found()) };
    match state.store.block_by_hash(&hash).await? {
        Some(row) => Ok(Json(BlockDto::from(row)).into_response()),
        None => Ok(not_found()),
    }
}
