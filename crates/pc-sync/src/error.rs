use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("peer {peer} sent a malformed response: {reason}")]
    Decode { peer: String, reason: String },

    #[error("blockchain error: {0}")]
    Blockchain(#[from] pc_blockchain::BlockchainError),
}
