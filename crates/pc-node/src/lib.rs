pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod node;
pub mod persistence;
pub mod protocol;
pub mod state;

pub use config::NodeConfig;
pub use error::NodeError;
pub use event::NodeEvent;
pub use http::{HttpPeerNetwork, NodeClient};
pub use node::{MineOutcome, Node};
pub use state::NodeState;
