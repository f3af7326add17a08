use futures::future::join_all;
use pc_blockchain::Blockchain;
use tracing::{debug, warn};

use crate::PeerNetwork;

/// A peer chain that beat the local one.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Address of the peer the chain came from.
    pub peer: String,
    pub chain: Blockchain,
}

/// Ask every peer for its chain and return the longest one that is strictly
/// longer than `local_len` and passes a full validity audit under
/// `difficulty`.
///
/// Peers are queried concurrently but evaluated in registration order, so
/// among equally long winners the first registered peer is kept.  A peer
/// that cannot be reached or sends a malformed dump is logged and skipped.
/// Nothing here touches the live chain; the caller decides whether to adopt
/// the result against its current tip.
pub async fn longest_valid_chain<N>(
    network: &N,
    peers: &[String],
    local_len: usize,
    difficulty: u32,
) -> Option<Candidate>
where
    N: PeerNetwork + ?Sized,
{
    let fetches = peers
        .iter()
        .map(|peer| async move { (peer, network.fetch_chain(peer).await) });
    let responses = join_all(fetches).await;

    let mut best_len = local_len;
    let mut best = None;

    for (peer, response) in responses {
        let dump = match response {
            Ok(dump) => dump,
            Err(e) => {
                warn!(%peer, error = %e, "skipping peer: chain fetch failed");
                continue;
            }
        };

        let chain = match dump.into_chain(difficulty) {
            Ok(chain) => chain,
            Err(e) => {
                warn!(%peer, error = %e, "skipping peer: malformed chain dump");
                continue;
            }
        };

        if chain.len() <= best_len {
            debug!(%peer, length = chain.len(), best_len, "peer chain not longer");
            continue;
        }
        if !chain.check_chain_validity() {
            warn!(%peer, length = chain.len(), "skipping peer: chain failed validation");
            continue;
        }

        debug!(%peer, length = chain.len(), "new best candidate chain");
        best_len = chain.len();
        best = Some(Candidate {
            peer: peer.clone(),
            chain,
        });
    }

    best
}
