//! Library crate backing the `pivxdex` sync binary and the standalone
//! read-side process (`src/bin/explorer_api.rs`). Splitting the two this
//! way keeps the read-side a genuinely separate process reading committed
//! state: the core indexer and the query surface deploy, scale, and
//! restart independently, sharing only the persisted schema.

pub mod address_codec;
pub mod api;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipeline;
pub mod processor;
pub mod reorg;
pub mod rpc;
pub mod script;
pub mod store;
pub mod supervisor;
pub mod types;
