use thiserror::Error;

/// Error taxonomy for the indexing engine (spec §7).
///
/// `DuplicateTransaction` intentionally has no variant: it's handled
/// in-band by `get_or_create` overwrite semantics, not raised as an error.
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("missing output for origin_tx_hash={origin_txid} index={index}")]
    MissingOutput { origin_txid: String, index: i32 },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("shutdown requested")]
    ShutdownRequested,

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("block decode error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, IndexerError>;
