use serde::{Deserialize, Serialize};
use pc_blockchain::{Block, Blockchain, BlockchainError};

/// Response body of a peer's chain endpoint.
///
/// Peers may add extra fields (validity flag, difficulty, peer list); they
/// are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDump {
    pub length: usize,
    pub chain: Vec<Block>,
}

impl ChainDump {
    pub fn of(chain: &Blockchain) -> Self {
        Self {
            length: chain.len(),
            chain: chain.blocks().to_vec(),
        }
    }

    /// Rebuild a detached chain value under the local difficulty.
    ///
    /// The whole dump is rejected if the advertised length disagrees with
    /// the block list or any block is structurally malformed.
    pub fn into_chain(self, difficulty: u32) -> Result<Blockchain, BlockchainError> {
        if self.length != self.chain.len() {
            return Err(BlockchainError::Decode(format!(
                "advertised length {} but sent {} blocks",
                self.length,
                self.chain.len()
            )));
        }
        Blockchain::from_blocks(self.chain, difficulty)
    }
}

/// Body of a registration request: the address the registering node can be
/// reached at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub node_address: String,
}

impl RegisterRequest {
    pub fn new(node_address: impl Into<String>) -> Self {
        Self {
            node_address: node_address.into(),
        }
    }
}

/// What a peer hands back after registering us: its chain and its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub chain: Vec<Block>,
    #[serde(default)]
    pub peers: Vec<String>,
}

impl RegisterResponse {
    pub fn of(chain: &Blockchain) -> Self {
        Self {
            chain: chain.blocks().to_vec(),
            peers: chain.peer_addresses(),
        }
    }
}
