pub mod announce;
pub mod consensus;
pub mod error;
pub mod network;
pub mod protocol;

pub use announce::{announce_block, AnnounceReport};
pub use consensus::{longest_valid_chain, Candidate};
pub use error::SyncError;
pub use network::{PeerNetwork, PushOutcome};
pub use protocol::{ChainDump, RegisterRequest, RegisterResponse};
