use std::time::Duration;

use pc_blockchain::Transaction;
use pc_node::{
    protocol::{ChainView, ConsensusResponse, MineResponse, NodeStatus},
    NodeClient, NodeError,
};
use tokio::{
    sync::mpsc,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, warn};

/// Timeout for a read from the node.  Mining can take much longer, so
/// commands get a separate bound.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Commands sent from the TUI to the controller task.
pub enum ControlCommand {
    /// Poll right away instead of waiting for the timer.
    Refresh,
    /// Point the controller at another node.
    SwitchNode(String),
    Request(NodeRequest),
}

/// Calls made against the node's API on the user's behalf.
pub enum NodeRequest {
    Post { author: String, content: String },
    Mine,
    Sync,
    Register(String),
}

/// Everything the views need from one poll.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub chain: ChainView,
    pub status: NodeStatus,
    pub pending: Vec<Transaction>,
}

/// Messages sent from the controller task back to the TUI.
pub enum ControlEvent {
    Snapshot(Box<Snapshot>),
    /// A poll failed; the node is treated as offline until the next success.
    Offline(String),
    Posted { author: String },
    Mined(MineResponse),
    Synced(ConsensusResponse),
    Registered(String),
    Switched(String),
    Error(String),
}

/// Talks to one node from a background Tokio task: polls it on a timer and
/// runs user commands against it.
pub struct NodeController {
    pub cmd_tx: mpsc::UnboundedSender<ControlCommand>,
    pub event_rx: mpsc::UnboundedReceiver<ControlEvent>,
}

impl NodeController {
    /// Spawn the controller task and return handles to communicate with it.
    pub fn spawn(node: String, poll_every: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ControlCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ControlEvent>();

        tokio::spawn(run_controller(node, poll_every, cmd_rx, event_tx));

        Self { cmd_tx, event_rx }
    }
}

/// A poll client and a command client for the same node.
struct Clients {
    poll: NodeClient,
    command: NodeClient,
}

impl Clients {
    fn connect(node: &str) -> Result<Self, NodeError> {
        Ok(Self {
            poll: NodeClient::new(node, POLL_TIMEOUT)?,
            command: NodeClient::new(node, COMMAND_TIMEOUT)?,
        })
    }
}

async fn run_controller(
    node: String,
    poll_every: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<ControlCommand>,
    event_tx: mpsc::UnboundedSender<ControlEvent>,
) {
    let mut clients = match Clients::connect(&node) {
        Ok(clients) => clients,
        Err(e) => {
            let _ = event_tx.send(ControlEvent::Error(e.to_string()));
            return;
        }
    };

    let mut ticker = interval(poll_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                poll(&clients.poll, &event_tx).await;
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    ControlCommand::Refresh => {}
                    ControlCommand::SwitchNode(address) => match Clients::connect(&address) {
                        Ok(next) => {
                            clients = next;
                            let _ = event_tx.send(ControlEvent::Switched(address));
                        }
                        Err(e) => {
                            let _ = event_tx.send(ControlEvent::Error(e.to_string()));
                            continue;
                        }
                    },
                    ControlCommand::Request(request) => {
                        let event = run_request(&clients.command, request).await;
                        if event_tx.send(event).is_err() {
                            break;
                        }
                    }
                }
                // Show the effect of every command right away.
                poll(&clients.poll, &event_tx).await;
            }
        }
    }
    debug!("controller task exiting");
}

async fn poll(client: &NodeClient, event_tx: &mpsc::UnboundedSender<ControlEvent>) {
    let fetched = tokio::try_join!(client.chain(), client.status(), client.pending());
    let event = match fetched {
        Ok((chain, status, pending)) => ControlEvent::Snapshot(Box::new(Snapshot {
            chain,
            status,
            pending,
        })),
        Err(e) => {
            warn!(node = %client.address(), error = %e, "poll failed");
            ControlEvent::Offline(e.to_string())
        }
    };
    let _ = event_tx.send(event);
}

async fn run_request(client: &NodeClient, request: NodeRequest) -> ControlEvent {
    let result = match request {
        NodeRequest::Post { author, content } => client
            .submit(author.clone(), content)
            .await
            .map(|()| ControlEvent::Posted { author }),
        NodeRequest::Mine => client.mine().await.map(ControlEvent::Mined),
        NodeRequest::Sync => client.consensus().await.map(ControlEvent::Synced),
        NodeRequest::Register(bootstrap) => client
            .register_with(bootstrap.clone())
            .await
            .map(|()| ControlEvent::Registered(bootstrap)),
    };
    result.unwrap_or_else(|e| ControlEvent::Error(e.to_string()))
}
