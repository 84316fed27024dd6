mod cli;

use std::sync::Arc;

use clap::Parser;
use pivxdex::config::{self, get_global_config, init_global_config};
use pivxdex::errors::Result;
use pivxdex::rpc::RpcClient;
use pivxdex::store::Store;
use pivxdex::supervisor::ShutdownSignal;
use pivxdex::{constants, pipeline, reorg};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_global_config(&cli.config)?;
    let settings = get_global_config();

    let log_level = cli.log_level.map(|l| l.as_filter().to_string()).unwrap_or_else(|| settings.log_level.clone());
    init_tracing(&log_level);

    let store = Arc::new(Store::connect(&settings.database_url).await?);
    let rpc = Arc::new(RpcClient::new(&settings.coinserv));

    let result = match cli.command {
        Command::InitDb => run_init_db(&store).await,
        Command::DeleteHighestBlock => run_delete_highest_block(&store).await,
        Command::Sync => run_sync(store, rpc, settings).await,
    };

    if let Err(err) = &result {
        error!(error = %err, "exiting with error");
    }
    result
}

/// `init-db` (§6): drop-and-create schema. Mirrors
/// `original_source/manage.py::init_db`'s `db.drop_all(); db.create_all()`.
async fn run_init_db(store: &Store) -> Result<()> {
    store.init_schema().await?;
    info!("schema (re)initialized");
    Ok(())
}

/// `delete-highest-block` (§6): admin rollback of exactly one block.
/// `original_source/manage.py::delete_highest_block`'s `@crontab` decorator
/// rolls back the SQLAlchemy session on any storage error; here the
/// transaction simply never commits if `delete_block_cascade` errors.
async fn run_delete_highest_block(store: &Store) -> Result<()> {
    let Some(tip) = store.local_tip().await? else {
        info!("store is empty, nothing to delete");
        return Ok(());
    };
    let mut txn = store.begin().await?;
    let height = Store::delete_block_cascade(&mut txn, tip.id).await?;
    txn.commit().await?;
    info!(height, "deleted highest block");
    Ok(())
}

/// `sync` (§6, §4.9): reconcile any fork, then run the fetch pipeline to
/// tip. Exits cleanly when already caught up (P6). The read-side API is a
/// separate process (`explorer-api`, §1/§12) — it is not started here.
async fn run_sync(store: Arc<Store>, rpc: Arc<RpcClient>, settings: &'static config::Settings) -> Result<()> {
    let shutdown = ShutdownSignal::new();
    shutdown.install();

    let outcome = reorg::reconcile(&store, &rpc, settings.reorg_horizon).await?;
    if outcome.blocks_removed > 0 {
        info!(removed = outcome.blocks_removed, "reorg: rolled back to common ancestor");
    }

    let from_height = match outcome.new_tip_height {
        Some(height) => height + 1,
        None => constants::HEIGHT_GENESIS,
    };
    if constants::is_genesis_height(from_height) {
        info!("store is empty, bootstrapping from the genesis block");
    }
    let to_height = rpc.get_block_count().await?;

    if from_height > to_height {
        info!(from_height, to_height, "already sync'd up");
        return Ok(());
    }

    let flag = shutdown.flag();
    let last_height = pipeline::run(store, rpc, Arc::new(settings.clone()), from_height, to_height, flag).await?;
    info!(last_height, "sync pipeline finished");
    Ok(())
}
