use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("blockchain error: {0}")]
    Blockchain(#[from] pc_blockchain::BlockchainError),

    #[error("transaction error: {0}")]
    Transaction(#[from] pc_transaction::TransactionError),

    #[error("sync error: {0}")]
    Sync(#[from] pc_sync::SyncError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialisation error: {0}")]
    Serialisation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("chain tip kept moving; gave up mining after {attempts} attempts")]
    TipMoved { attempts: usize },

    #[error("bootstrap peer {peer} returned a chain that failed validation")]
    UntrustedBootstrap { peer: String },

    #[error("node_address must not be empty")]
    EmptyPeerAddress,

    #[error("node answered {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
