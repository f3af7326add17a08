use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use pc_blockchain::Blockchain;
use pc_node::{api, persistence, HttpPeerNetwork, Node, NodeConfig, NodeError};
use tokio::{
    net::TcpListener,
    sync::watch,
    time::{interval, MissedTickBehavior},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Postchain ledger node daemon.
#[derive(Parser, Debug)]
#[command(
    name = "pc-node",
    version,
    about = "Postchain ledger node",
    long_about = "Runs a postchain node that accepts posts, mines them into \
                  proof-of-work blocks and keeps its chain in step with peers."
)]
struct Cli {
    /// TCP port the HTTP API listens on.
    #[arg(short, long, default_value_t = 8000, env = "PC_PORT")]
    port: u16,

    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0", env = "PC_HOST")]
    host: String,

    /// Leading zero hex digits required of a block hash (fresh chains only).
    #[arg(short, long, default_value_t = pc_blockchain::DEFAULT_DIFFICULTY, env = "PC_DIFFICULTY")]
    difficulty: u32,

    /// Chain snapshot file, loaded at start-up and written on shutdown.
    #[arg(long, default_value = "blockchain.json", env = "PC_DATA")]
    data: PathBuf,

    /// Timeout in seconds for every call to a peer.
    #[arg(long, default_value_t = 10, env = "PC_PEER_TIMEOUT")]
    peer_timeout: u64,

    /// Address advertised to peers, e.g. http://node-a:8000.
    #[arg(long, env = "PC_PUBLIC_ADDRESS")]
    public_address: Option<String>,

    /// Node to register with at start-up.
    #[arg(short, long, env = "PC_BOOTSTRAP")]
    bootstrap: Option<String>,

    /// Refuse a bootstrap chain that fails validation.
    #[arg(long, default_value_t = false, env = "PC_VERIFY_BOOTSTRAP")]
    verify_bootstrap: bool,

    /// Run consensus every N seconds. 0 disables it.
    #[arg(long, default_value_t = 0, env = "PC_SYNC_INTERVAL")]
    sync_interval: u64,

    /// Suppress log output to stderr (run silently).
    #[arg(short, long, default_value_t = false, env = "PC_QUIET")]
    quiet: bool,
}

impl Cli {
    fn into_config(self) -> Result<NodeConfig, NodeError> {
        let config = NodeConfig {
            host: self.host,
            port: self.port,
            difficulty: self.difficulty,
            snapshot_path: self.data,
            peer_timeout: Duration::from_secs(self.peer_timeout),
            public_address: self.public_address,
            bootstrap: self.bootstrap,
            verify_bootstrap_chain: self.verify_bootstrap,
            sync_interval: (self.sync_interval > 0)
                .then(|| Duration::from_secs(self.sync_interval)),
            quiet: self.quiet,
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    let log_filter = if config.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::from_default_env().add_directive("pc_node=info".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let chain = match persistence::load(&config.snapshot_path)? {
        Some(chain) => {
            if chain.difficulty() != config.difficulty {
                warn!(
                    snapshot = chain.difficulty(),
                    requested = config.difficulty,
                    "keeping the snapshot's difficulty"
                );
            }
            chain
        }
        None => Blockchain::with_difficulty(config.difficulty),
    };

    info!(
        listen = %config.listen_addr(),
        difficulty = chain.difficulty(),
        length = chain.len(),
        snapshot = %config.snapshot_path.display(),
        "Starting postchain node"
    );

    let network = Arc::new(HttpPeerNetwork::new(config.peer_timeout)?);
    let (node, mut events) = Node::new(config.clone(), chain, network);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!("NodeEvent: {event:?}");
        }
    });

    let listener = TcpListener::bind(config.listen_addr()).await?;

    if let Some(bootstrap) = &config.bootstrap {
        match node.register_with(bootstrap, None).await {
            Ok(length) => info!(%bootstrap, length, "bootstrapped"),
            Err(e) => warn!(%bootstrap, error = %e, "bootstrap registration failed"),
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let Some(every) = config.sync_interval {
        spawn_periodic_consensus(node.clone(), every, shutdown_rx.clone());
    }

    let signal_node = node.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
        signal_node.shutdown();
        let _ = shutdown_tx.send(true);
    };

    api::serve(node.clone(), listener, shutdown).await?;

    persistence::save(&config.snapshot_path, &node.chain_snapshot().await)?;
    Ok(())
}

/// Run consensus every `every` until shutdown is signalled.
fn spawn_periodic_consensus(node: Node, every: Duration, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if node.consensus().await {
                        let length = node.len().await;
                        info!(length, "periodic consensus replaced chain");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    });
}
