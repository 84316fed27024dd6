//! Standalone read-side process (spec §1, §12): serves the thin JSON query
//! surface over the schema the `pivxdex` sync binary writes. Kept as its
//! own binary, against its own `Store` connection, so the core indexer and
//! the explorer API can be deployed, scaled, and restarted independently —
//! the read-side's only dependency on the core is the persisted schema.

use std::sync::Arc;

use clap::Parser;
use pivxdex::api::{self, AppState};
use pivxdex::config::{get_global_config, init_global_config};
use pivxdex::errors::{IndexerError, Result};
use pivxdex::store::Store;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "explorer-api", about = "Read-side JSON query surface over the indexed schema")]
struct Args {
    /// Path to the same YAML config the sync binary uses (§6, §10.3).
    #[arg(long, default_value = "config.yml")]
    config: String,

    /// Address to bind the read-side HTTP listener on.
    #[arg(long, default_value = "0.0.0.0:3005")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_global_config(&args.config)?;
    let settings = get_global_config();

    let filter = EnvFilter::try_new(settings.log_level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = Arc::new(Store::connect(&settings.database_url).await?);
    let state = AppState { store, config: Arc::new(settings.clone()) };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .map_err(|e| IndexerError::Decode(format!("failed to bind read-side listener: {e}")))?;
    tracing::info!(listen = %args.listen, "read-side API listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| IndexerError::Decode(format!("read-side server exited: {e}")))?;
    Ok(())
}
