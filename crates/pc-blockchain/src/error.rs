use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("previous hash {found} does not match tip hash {expected}")]
    InvalidPreviousHash { expected: String, found: String },

    #[error("block #{index} carries an invalid proof of work")]
    InvalidProof { index: u64 },

    #[error("malformed chain dump: {0}")]
    Decode(String),

    #[error("difficulty {0} exceeds the {max} hex digits of a block hash", max = crate::MAX_DIFFICULTY)]
    UnreachableDifficulty(u32),

    #[error("proof-of-work search was cancelled")]
    MiningCancelled,

    #[error("nonce space exhausted without meeting difficulty")]
    NonceExhausted,

    #[error("transaction error: {0}")]
    Transaction(#[from] pc_transaction::TransactionError),
}
