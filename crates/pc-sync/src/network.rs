use async_trait::async_trait;
use pc_blockchain::Block;

use crate::{ChainDump, RegisterRequest, RegisterResponse, SyncError};

/// Outcome of pushing a block to a peer that answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    /// The peer refused the block, usually because its tip has diverged.
    Rejected(String),
}

/// The node-to-node calls consensus and announcement depend on.
///
/// Implementations must bound every call with a timeout and report transport
/// failures as [`SyncError::PeerUnreachable`] so callers can skip the peer.
#[async_trait]
pub trait PeerNetwork: Send + Sync {
    /// Fetch a peer's full chain.
    async fn fetch_chain(&self, peer: &str) -> Result<ChainDump, SyncError>;

    /// Offer a freshly mined block to a peer.
    async fn push_block(&self, peer: &str, block: &Block) -> Result<PushOutcome, SyncError>;

    /// Ask a peer to register us and return its chain and peer list.
    async fn register(
        &self,
        peer: &str,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, SyncError>;
}
