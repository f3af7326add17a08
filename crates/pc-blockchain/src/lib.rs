pub mod block;
pub mod blockchain;
pub mod error;
pub mod pow;

pub use block::Block;
pub use blockchain::{Blockchain, Peer};
pub use error::BlockchainError;
pub use pc_transaction::{NewTransaction, Transaction, TransactionError};

/// Number of leading `'0'` hex characters a block hash needs unless the
/// node is configured otherwise.
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Width of a SHA-256 hex digest.  No hash can carry more leading zeros.
pub const MAX_DIFFICULTY: u32 = 64;
