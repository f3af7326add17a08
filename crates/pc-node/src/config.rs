use std::{path::PathBuf, time::Duration};

use pc_blockchain::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};

use crate::error::NodeError;

/// Full configuration for a [`crate::Node`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Interface the HTTP API binds to.  Defaults to `0.0.0.0`.
    pub host: String,

    /// TCP port the HTTP API listens on.  Defaults to `8000`.
    pub port: u16,

    /// Leading zero hex digits a block hash needs.  Only used for a fresh
    /// chain; a loaded snapshot keeps its own difficulty.
    pub difficulty: u32,

    /// Where the chain snapshot is loaded from at start-up and written on
    /// shutdown.
    pub snapshot_path: PathBuf,

    /// Upper bound on every outbound peer call.
    pub peer_timeout: Duration,

    /// Address other nodes should use to reach us.  When `None` it is
    /// derived from the request host or the listen port.
    pub public_address: Option<String>,

    /// Node to register with at start-up.
    pub bootstrap: Option<String>,

    /// Refuse a bootstrap chain that fails validation instead of adopting it
    /// with a warning.
    pub verify_bootstrap_chain: bool,

    /// Run consensus periodically.  `None` disables the background round.
    pub sync_interval: Option<Duration>,

    /// Silence the binary's log output.
    pub quiet: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            difficulty: DEFAULT_DIFFICULTY,
            snapshot_path: PathBuf::from("blockchain.json"),
            peer_timeout: Duration::from_secs(10),
            public_address: None,
            bootstrap: None,
            verify_bootstrap_chain: false,
            sync_interval: None,
            quiet: false,
        }
    }
}

impl NodeConfig {
    /// Default config listening on `port`.
    pub fn on_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Reject settings the node could never run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(NodeError::InvalidConfig(format!(
                "difficulty {} is above the maximum of {MAX_DIFFICULTY}",
                self.difficulty
            )));
        }
        if self.peer_timeout.is_zero() {
            return Err(NodeError::InvalidConfig(
                "peer timeout must be at least 1 second".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The address we hand to peers when registering.
    pub fn advertised_address(&self) -> String {
        self.public_address
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.port))
    }
}
