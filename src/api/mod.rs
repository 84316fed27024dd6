//! Read-side JSON API (spec §6, §12): a thin query surface over the store,
//! built on `axum`, cut down to exactly the shapes §6 lists. No HTML
//! rendering, no masternode/governance/xpub/mempool/websocket routes —
//! those have no counterpart here.

mod addresses;
mod blocks;
mod dto;
mod search;
mod transactions;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Settings;
use crate::errors::IndexerError;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<Settings>,
}

/// §7: "the read-side translates all storage errors into empty result sets
/// for search queries; hard errors surface as HTTP 5xx." Search routes
/// catch their own errors and return `NotFound`; this impl covers the
/// remaining direct-lookup routes, which have no such fallback.
pub struct ApiError(IndexerError);

impl From<IndexerError> for ApiError {
    fn from(err: IndexerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "read-side query failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

#[derive(Serialize)]
struct NotFound {
    error: &'static str,
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(NotFound { error: "not found" })).into_response()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/v1/blocks", get(blocks::latest))
        .route("/api/v1/blocks/{height}", get(blocks::by_height))
        .route("/api/v1/block/{hash}", get(blocks::by_hash))
        .route("/api/v1/transactions", get(transactions::latest))
        .route("/api/v1/tx/{txid}", get(transactions::by_txid))
        .route("/api/v1/address/{address}", get(addresses::show))
        .route("/api/v1/address/{address}/outputs", get(addresses::outputs))
        .route("/api/v1/search/{query}", get(search::search))
        .layer(cors)
        .with_state(state)
}
