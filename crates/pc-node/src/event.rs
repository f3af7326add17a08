use pc_blockchain::{Block, Transaction};

/// High-level events emitted by a running [`crate::Node`] that callers (e.g.
/// the daemon's logger) can subscribe to via a channel.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A client transaction entered the pending pool.
    TransactionQueued(Transaction),

    /// This node sealed and appended a block.
    BlockMined(Block),

    /// A peer's announced block extended the local chain.
    BlockAccepted(Block),

    /// The local chain was replaced by a longer valid peer chain.
    ChainReplaced { peer: String, new_length: usize },

    /// Another node registered with us.
    PeerRegistered(String),

    /// The node adopted a bootstrap peer's chain and peer list.
    Bootstrapped { peer: String, new_length: usize },

    /// A mined block was pushed to the registered peers.
    BlockAnnounced {
        index: u64,
        accepted: usize,
        rejected: usize,
        unreachable: usize,
    },
}
