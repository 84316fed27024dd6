//! Fetch pipeline (spec §4.6): bounded producer/consumer feeding the block
//! processor in strict height order.
//!
//! Grounded on `parallel.rs::process_files_parallel`'s semaphore-bounded
//! concurrent-task pattern, retargeted from file reads to RPC fetches, with
//! a height-ordered reorder buffer standing in for
//! `original_source/lincoln/sync.py`'s `guv.queue.PriorityQueue`.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::config::Settings;
use crate::constants::FETCH_QUEUE_CAPACITY;
use crate::errors::Result;
use crate::processor::process_block;
use crate::rpc::RpcClient;
use crate::store::Store;
use crate::supervisor::{BlockTimer, EtaTracker};
use crate::types::DecodedBlock;

const MAX_CONCURRENT_FETCHES: usize = 8;
const REMOTE_FETCH_DELAY: Duration = Duration::from_millis(50);

struct Ordered(i32, DecodedBlock);

impl PartialEq for Ordered {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Ordered {}
impl PartialOrd for Ordered {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for Ordered {
    // Reversed so `BinaryHeap` (a max-heap) pops the *lowest* height first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.0.cmp(&self.0)
    }
}

/// Drives ingestion of `from_height..=to_height`. Producers fetch blocks
/// concurrently under a bounded semaphore; the single consumer here
/// dequeues strictly by ascending height and hands each block to the
/// processor inside its own commit.
pub async fn run(
    store: Arc<Store>,
    rpc: Arc<RpcClient>,
    config: Arc<Settings>,
    from_height: i32,
    to_height: i32,
    shutdown: Arc<AtomicBool>,
) -> Result<i32> {
    if from_height > to_height {
        // P6: nothing to do, commits nothing, exits cleanly.
        return Ok(from_height - 1);
    }

    let (tx, mut rx) = mpsc::channel::<(i32, DecodedBlock)>(FETCH_QUEUE_CAPACITY);
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES));
    let remote = rpc.remote;

    let producer_rpc = rpc.clone();
    let producer_shutdown = shutdown.clone();
    let producer = tokio::spawn(async move {
        for height in from_height..=to_height {
            if producer_shutdown.load(Ordering::SeqCst) {
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else { break };
            let rpc = producer_rpc.clone();
            let out = tx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let fetched = async {
                    let hash = rpc.get_block_hash(height).await?;
                    rpc.get_block(hash).await
                }
                .await;
                match fetched {
                    Ok(block) => {
                        let _ = out.send((height, block)).await;
                    }
                    Err(error) => warn!(height, %error, "failed to fetch block, will retry on resync"),
                }
            });
            if remote {
                tokio::time::sleep(REMOTE_FETCH_DELAY).await;
            }
        }
    });

    let mut next_height = from_height;
    let mut reorder_buffer: BinaryHeap<Ordered> = BinaryHeap::new();
    let eta = EtaTracker::new(config.log_level.eq_ignore_ascii_case("DEBUG"));

    'consume: while next_height <= to_height {
        if shutdown.load(Ordering::SeqCst) {
            info!(next_height, "graceful shutdown: stopping before the next block");
            break;
        }

        if matches!(reorder_buffer.peek(), Some(top) if top.0 == next_height) {
            let Ordered(height, block) = reorder_buffer.pop().expect("peek just confirmed an element");
            let timer = BlockTimer::start();
            process_block(&store, &rpc, &config, height, block).await?;
            timer.finish(&eta, height, to_height).await;
            next_height += 1;
            continue;
        }

        match rx.recv().await {
            Some((height, block)) if height == next_height => {
                let timer = BlockTimer::start();
                process_block(&store, &rpc, &config, height, block).await?;
                timer.finish(&eta, height, to_height).await;
                next_height += 1;
            }
            Some((height, block)) => reorder_buffer.push(Ordered(height, block)),
            None => break 'consume,
        }
    }

    producer.abort();
    Ok(next_height - 1)
}
