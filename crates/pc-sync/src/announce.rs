use futures::future::join_all;
use pc_blockchain::Block;
use tracing::{debug, info, warn};

use crate::{PeerNetwork, PushOutcome};

/// Per-peer result of a block announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnounceReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub unreachable: Vec<String>,
}

impl AnnounceReport {
    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len() + self.unreachable.len()
    }
}

/// Push `block` to every peer.
///
/// Rejections are expected when a peer's tip has diverged and are not
/// retried.  An unreachable peer never stops the remaining pushes.
pub async fn announce_block<N>(network: &N, peers: &[String], block: &Block) -> AnnounceReport
where
    N: PeerNetwork + ?Sized,
{
    let pushes = peers
        .iter()
        .map(|peer| async move { (peer, network.push_block(peer, block).await) });

    let mut report = AnnounceReport::default();
    for (peer, outcome) in join_all(pushes).await {
        match outcome {
            Ok(PushOutcome::Accepted) => {
                debug!(%peer, index = block.index, "peer accepted block");
                report.accepted.push(peer.clone());
            }
            Ok(PushOutcome::Rejected(reason)) => {
                debug!(%peer, index = block.index, %reason, "peer rejected block");
                report.rejected.push(peer.clone());
            }
            Err(e) => {
                warn!(%peer, error = %e, "failed to announce block");
                report.unreachable.push(peer.clone());
            }
        }
    }

    info!(
        index = block.index,
        accepted = report.accepted.len(),
        rejected = report.rejected.len(),
        unreachable = report.unreachable.len(),
        "block announced"
    );
    report
}
