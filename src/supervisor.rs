//! Sync supervisor (spec §4.9): owns the top-level sync loop around the
//! fetch pipeline — graceful shutdown on signal and catch-up ETA reporting.
//!
//! Grounded on `original_source/sync.py`'s `sig_handler` (two-stage SIGINT:
//! the first sets a flag honored between blocks, the second exits
//! immediately) and its `block_times` deque-based ETA estimator, combined
//! with `monitor.rs`'s polling-loop shape. `tokio::signal::ctrl_c` plus an
//! atomic counter stand in for the Python `loop = [1]` list trick, which
//! relied on mutating a shared list from inside the signal handler.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::info;

use crate::constants::BLOCK_TIME_WINDOW;

/// Shared shutdown flag, set once the first interrupt arrives. Checked by
/// the fetch pipeline between blocks (§4.6) so the in-flight block still
/// commits before the process exits.
#[derive(Clone)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    interrupts: Arc<AtomicUsize>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)), interrupts: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }

    /// Installs the ctrl-c handler in the background. The first interrupt
    /// flips `flag` and logs; a second exits the process immediately,
    /// matching the original's "first SIGINT drains, second SIGINT kills".
    pub fn install(&self) {
        let signal = self.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    break;
                }
                let count = signal.interrupts.fetch_add(1, Ordering::SeqCst) + 1;
                if count == 1 {
                    info!("caught exit signal, cleaning up...");
                    signal.flag.store(true, Ordering::SeqCst);
                } else {
                    info!("second exit signal received, exiting immediately");
                    std::process::exit(0);
                }
            }
        });
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Moving-window ETA estimator over the last `BLOCK_TIME_WINDOW` per-block
/// processing durations (§4.9). Logged every block at debug verbosity, or
/// every 100 blocks otherwise, mirroring the original's `interval` switch.
pub struct EtaTracker {
    samples: Mutex<VecDeque<Duration>>,
    debug: bool,
}

impl EtaTracker {
    pub fn new(debug: bool) -> Self {
        Self { samples: Mutex::new(VecDeque::with_capacity(BLOCK_TIME_WINDOW)), debug }
    }

    fn log_interval(&self) -> i32 {
        if self.debug {
            1
        } else {
            100
        }
    }

    /// Records the time a single block took to process, and — when
    /// `height` lands on the logging interval — emits a catch-up ETA based
    /// on the moving average.
    pub async fn record(&self, height: i32, server_height: i32, elapsed: Duration) {
        let mut samples = self.samples.lock().await;
        if samples.len() == BLOCK_TIME_WINDOW {
            samples.pop_front();
        }
        samples.push_back(elapsed);

        if height % self.log_interval() == 0 {
            let total: Duration = samples.iter().sum();
            let average = total / samples.len() as u32;
            let remaining_blocks = (server_height - height).max(0) as u32;
            let remaining = average * remaining_blocks;
            info!(
                height,
                server_height,
                remaining_secs = remaining.as_secs(),
                "{}/{} ~{}s estimated to catch up",
                height,
                server_height,
                remaining.as_secs()
            );
        }
    }
}

/// Times a single block's processing and feeds the result to `tracker`.
pub struct BlockTimer {
    started: Instant,
}

impl BlockTimer {
    pub fn start() -> Self {
        Self { started: Instant::now() }
    }

    pub async fn finish(self, tracker: &EtaTracker, height: i32, server_height: i32) {
        tracker.record(height, server_height, self.started.elapsed()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn eta_tracker_averages_and_does_not_panic_on_empty_remainder() {
        let tracker = EtaTracker::new(true);
        tracker.record(1, 1, Duration::from_millis(100)).await;
        tracker.record(2, 1, Duration::from_millis(200)).await;
        let samples = tracker.samples.lock().await;
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn log_interval_switches_on_debug() {
        assert_eq!(EtaTracker::new(true).log_interval(), 1);
        assert_eq!(EtaTracker::new(false).log_interval(), 100);
    }

    #[test]
    fn shutdown_signal_starts_unset() {
        let signal = ShutdownSignal::new();
        assert!(!signal.flag().load(Ordering::SeqCst));
    }
}
