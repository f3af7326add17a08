//! JSON bodies of the node's client-facing endpoints.
//!
//! The server serialises these and [`crate::NodeClient`] decodes them, so
//! both sides share one definition.
use serde::{Deserialize, Serialize};

use pc_blockchain::{Block, Transaction};

use crate::NodeState;

/// Body of `GET /chain`.
///
/// A superset of [`pc_sync::ChainDump`], so peers can decode it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainView {
    pub length: usize,
    pub chain: Vec<Block>,
    pub is_valid: bool,
    pub difficulty: u32,
    pub peers: Vec<String>,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub state: NodeState,
    pub length: usize,
    pub pending: usize,
    pub peers: usize,
    pub difficulty: u32,
    /// Hash of the last block.
    pub tip: String,
}

/// Body of `GET /mine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineResponse {
    pub message: String,
    pub chain_length: usize,
    /// Transactions carried by the mined block; empty when nothing was
    /// pending.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Body of `GET /consensus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusResponse {
    pub replaced: bool,
    pub chain_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of every non-2xx answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
