use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::{not_found, ApiError, AppState};
use crate::address_codec::decode_base58check;
use crate::api::dto::{AddressDto, OutputDto};
use crate::store::address;

#[derive(Debug, Deserialize)]
pub struct OutputsQuery {
    offset: Option<i64>,
    limit: Option<i64>,
}

pub async fn show(State(state): State<AppState>, Path(address): Path<String>) -> Result<Response, ApiError> {
    let Ok((hash, _version)) = decode_base58check(&address) else { return Ok(not_found()) };
    match address::by_hash(state.store.pool(), &hash).await? {
        Some(row) => Ok(Json(AddressDto::from(row)).into_response()),
        None => Ok(not_found()),
    }
}

pub async fn outputs(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<OutputsQuery>,
) -> Result<Response, ApiError> {
    let Ok((hash, _version)) = decode_base58check(&address) else { return Ok(not_found()) };
    let limit = query.limit.unwrap_or(state.config.outputs_per_page as i64).min(state.config.outputs_per_page as i64);
    let offset = query.offset.unwrap_or(0).max(0);
    let rows = address::outputs_of_address(state.store.pool(), &hash, limit, offset).await?;
    Ok(Json(rows.into_iter().map(OutputDto::from).collect::<Vec<_>>()).into_response())
}
