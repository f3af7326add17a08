use serde::{Deserialize, Serialize};

/// What the node's chain is busy with.
///
/// Syncing takes precedence when a consensus round runs while a block is
/// being mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    #[default]
    Idle,
    Mining,
    Syncing,
}

impl NodeState {
    pub fn label(&self) -> &'static str {
        match self {
            NodeState::Idle => "idle",
            NodeState::Mining => "mining",
            NodeState::Syncing => "syncing",
        }
    }
}
