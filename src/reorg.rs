//! Reorg controller (spec §4.7, §4.8) — the only component that removes
//! blocks. Invoked at startup, before the fetch pipeline resumes forward
//! sync.
//!
//! Reimplemented against the relational store (cascading deletes with
//! aggregate reversal, §4.8) instead of a column-family KV deletion.
//! Follows §4.7's one-block-at-a-time walk: compare the local tip against
//! the daemon at the same height, and if they disagree, delete the tip
//! and retry one block lower.

use tracing::{info, warn};

use crate::errors::Result;
use crate::rpc::RpcClient;
use crate::store::Store;

#[derive(Debug, Clone, Copy)]
pub struct ReorgOutcome {
    pub blocks_removed: i32,
    pub new_tip_height: Option<i32>,
}

/// Runs the reorg check/repair described in §4.7. A no-op (returns
/// `blocks_removed: 0`) when the store is empty or already too far behind
/// the daemon to bother checking (the `reorg_horizon` design limit).
pub async fn reconcile(store: &Store, rpc: &RpcClient, reorg_horizon: i32) -> Result<ReorgOutcome> {
    let Some(mut tip) = store.local_tip().await? else {
        return Ok(ReorgOutcome { blocks_removed: 0, new_tip_height: None });
    };

    let server_height = rpc.get_block_count().await?;
    if server_height >= tip.height + reorg_horizon {
        warn!(
            local_height = tip.height,
            server_height, reorg_horizon, "too far behind to check for a fork, skipping reorg scan"
        );
        return Ok(ReorgOutcome { blocks_removed: 0, new_tip_height: Some(tip.height) });
    }

    let mut removed = 0;
    loop {
        let rpc_hash = rpc.get_block_hash(tip.height).await?;
        if rpc_hash[..] == tip.hash[..] {
            break;
        }

        info!(height = tip.height, "reorg: local block disagrees with daemon, rolling back");
        let mut txn = store.begin().await?;
        let rolled_back_height = Store::delete_block_cascade(&mut txn, tip.id).await?;
        txn.commit().await?;
        removed += 1;
        info!(height = rolled_back_height, "reorg: block removed");

        tip = match store.local_tip().await? {
            Some(new_tip) => new_tip,
            None => {
                return Ok(ReorgOutcome { blocks_removed: removed, new_tip_height: None });
            }
        };
    }

    Ok(ReorgOutcome { blocks_removed: removed, new_tip_height: Some(tip.height) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_reports_no_removal_when_heights_already_agree() {
        let outcome = ReorgOutcome { blocks_removed: 0, new_tip_height: Some(10) };
        assert_eq!(outcome.blocks_removed, 0);
        assert_eq!(outcome.new_tip_height, Some(10));
    }
}
