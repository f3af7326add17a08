use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use chrono::Utc;
use pc_blockchain::{pow, Block, Blockchain, BlockchainError, NewTransaction, Peer, Transaction};
use pc_sync::{
    announce_block, longest_valid_chain, AnnounceReport, ChainDump, PeerNetwork, RegisterRequest,
    RegisterResponse,
};
use tokio::{
    sync::{mpsc, Mutex, RwLock},
    task,
};
use tracing::{debug, info, warn};

use crate::{
    config::NodeConfig,
    error::NodeError,
    event::NodeEvent,
    protocol::{ChainView, NodeStatus},
    state::NodeState,
};

/// How many times a sealed block is re-mined after the tip moved underneath
/// the proof-of-work search.
pub const MAX_MINE_ATTEMPTS: usize = 3;

/// Result of a mining request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineOutcome {
    /// The pool was empty.
    NothingToMine,
    /// A block was sealed and appended.  `kept` is false when a consensus
    /// round right afterwards replaced it with a longer peer chain.
    Mined { block: Block, kept: bool },
}

/// A ledger node.
///
/// Cheap to clone: every clone shares one chain, one peer client and one
/// event channel.  All request handlers and background tasks operate on
/// clones of the same handle.
#[derive(Clone)]
pub struct Node {
    inner: Arc<Inner>,
}

struct Inner {
    config: NodeConfig,
    chain: RwLock<Blockchain>,
    network: Arc<dyn PeerNetwork>,
    /// Serialises miners so only one proof-of-work search runs at a time.
    mining: Mutex<()>,
    /// Raised on shutdown; aborts a running search.
    cancel: Arc<AtomicBool>,
    mining_jobs: AtomicUsize,
    sync_rounds: AtomicUsize,
    event_tx: mpsc::UnboundedSender<NodeEvent>,
}

/// Counts one in-flight activity for [`Node::state`].
struct Busy<'a>(&'a AtomicUsize);

impl<'a> Busy<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Node {
    /// Wrap `chain` in a node that reaches peers through `network`.
    ///
    /// Returns the node together with a receiver for [`NodeEvent`]s that the
    /// calling application can process independently.
    pub fn new(
        config: NodeConfig,
        chain: Blockchain,
        network: Arc<dyn PeerNetwork>,
    ) -> (Self, mpsc::UnboundedReceiver<NodeEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let node = Self {
            inner: Arc::new(Inner {
                config,
                chain: RwLock::new(chain),
                network,
                mining: Mutex::new(()),
                cancel: Arc::new(AtomicBool::new(false)),
                mining_jobs: AtomicUsize::new(0),
                sync_rounds: AtomicUsize::new(0),
                event_tx,
            }),
        };
        (node, event_rx)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn state(&self) -> NodeState {
        if self.inner.sync_rounds.load(Ordering::SeqCst) > 0 {
            NodeState::Syncing
        } else if self.inner.mining_jobs.load(Ordering::SeqCst) > 0 {
            NodeState::Mining
        } else {
            NodeState::Idle
        }
    }

    fn emit(&self, event: NodeEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    /// A detached copy of the whole ledger state.
    pub async fn chain_snapshot(&self) -> Blockchain {
        self.inner.chain.read().await.clone()
    }

    pub async fn chain_dump(&self) -> ChainDump {
        ChainDump::of(&*self.inner.chain.read().await)
    }

    pub async fn chain_view(&self) -> ChainView {
        let chain = self.inner.chain.read().await;
        ChainView {
            length: chain.len(),
            chain: chain.blocks().to_vec(),
            is_valid: chain.check_chain_validity(),
            difficulty: chain.difficulty(),
            peers: chain.peer_addresses(),
        }
    }

    pub async fn pending(&self) -> Vec<Transaction> {
        self.inner.chain.read().await.pending_transactions().to_vec()
    }

    pub async fn peers(&self) -> Vec<String> {
        self.inner.chain.read().await.peer_addresses()
    }

    pub async fn len(&self) -> usize {
        self.inner.chain.read().await.len()
    }

    pub async fn status(&self) -> NodeStatus {
        let chain = self.inner.chain.read().await;
        NodeStatus {
            state: self.state(),
            length: chain.len(),
            pending: chain.pending_transactions().len(),
            peers: chain.peers().len(),
            difficulty: chain.difficulty(),
            tip: chain.tip().hash.clone(),
        }
    }

    // ── Client operations ───────────────────────────────────────────────────

    /// Stamp a client submission with the current time and queue it.
    pub async fn submit_transaction(&self, new_tx: NewTransaction) -> Result<Transaction, NodeError> {
        let tx = new_tx.stamp(Utc::now().timestamp())?;
        self.inner.chain.write().await.add_transaction(tx.clone())?;
        debug!(author = %tx.author, "transaction queued");
        self.emit(NodeEvent::TransactionQueued(tx.clone()));
        Ok(tx)
    }

    /// Mine the pending pool into a block, then run consensus and announce
    /// the block if it is still our tip.
    ///
    /// The proof-of-work search runs on a blocking thread with no chain lock
    /// held, so reads and submissions continue meanwhile.  Local miners stay
    /// serialised until the block is announced, so a later local block never
    /// reaches peers ahead of its parent.
    pub async fn mine(&self) -> Result<MineOutcome, NodeError> {
        let _serial = self.inner.mining.lock().await;
        let sealed = {
            let _busy = Busy::enter(&self.inner.mining_jobs);
            match self.seal_and_commit().await? {
                Some(block) => block,
                None => {
                    debug!("mine requested with an empty pool");
                    return Ok(MineOutcome::NothingToMine);
                }
            }
        };

        info!(
            index = sealed.index,
            hash = %sealed.hash,
            transactions = sealed.transactions.len(),
            "mined block"
        );
        self.emit(NodeEvent::BlockMined(sealed.clone()));

        self.consensus().await;

        let kept = {
            let mut chain = self.inner.chain.write().await;
            if chain.blocks().iter().any(|b| b.hash == sealed.hash) {
                true
            } else {
                let requeued = chain.requeue(&sealed.transactions);
                warn!(
                    index = sealed.index,
                    requeued, "mined block displaced by a longer peer chain"
                );
                false
            }
        };

        if kept && self.inner.chain.read().await.tip().hash == sealed.hash {
            self.announce(&sealed).await;
        }
        Ok(MineOutcome::Mined {
            block: sealed,
            kept,
        })
    }

    async fn seal_and_commit(&self) -> Result<Option<Block>, NodeError> {
        for attempt in 1..=MAX_MINE_ATTEMPTS {
            let (candidate, difficulty) = {
                let chain = self.inner.chain.read().await;
                match chain.candidate_block(Utc::now().timestamp()) {
                    Some(candidate) => (candidate, chain.difficulty()),
                    None => return Ok(None),
                }
            };

            let cancel = Arc::clone(&self.inner.cancel);
            let sealed = task::spawn_blocking(move || pow::seal(candidate, difficulty, &cancel))
                .await
                .map_err(|e| NodeError::Task(e.to_string()))??;

            let mut chain = self.inner.chain.write().await;
            match chain.commit_mined(sealed.clone()) {
                Ok(()) => return Ok(Some(sealed)),
                Err(BlockchainError::InvalidPreviousHash { .. }) => {
                    warn!(attempt, "chain tip moved during proof-of-work search, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(NodeError::TipMoved {
            attempts: MAX_MINE_ATTEMPTS,
        })
    }

    /// Replace the local chain with the longest valid peer chain, if any peer
    /// has one strictly longer.  Returns whether the chain was replaced.
    pub async fn consensus(&self) -> bool {
        let _busy = Busy::enter(&self.inner.sync_rounds);
        let (peers, local_len, difficulty) = {
            let chain = self.inner.chain.read().await;
            (chain.peer_addresses(), chain.len(), chain.difficulty())
        };
        if peers.is_empty() {
            return false;
        }

        let Some(candidate) =
            longest_valid_chain(self.inner.network.as_ref(), &peers, local_len, difficulty).await
        else {
            debug!(peers = peers.len(), local_len, "no longer peer chain");
            return false;
        };

        let new_length = candidate.chain.len();
        // The chain may have grown while peers were being queried.
        let replaced = self.inner.chain.write().await.sync_from(candidate.chain);
        if replaced {
            info!(peer = %candidate.peer, new_length, "adopted longer chain from peer");
            self.emit(NodeEvent::ChainReplaced {
                peer: candidate.peer,
                new_length,
            });
        } else {
            debug!(peer = %candidate.peer, "candidate chain no longer longer than local");
        }
        replaced
    }

    /// Push `block` to every registered peer.
    pub async fn announce(&self, block: &Block) -> AnnounceReport {
        let peers = self.peers().await;
        let report = announce_block(self.inner.network.as_ref(), &peers, block).await;
        self.emit(NodeEvent::BlockAnnounced {
            index: block.index,
            accepted: report.accepted.len(),
            rejected: report.rejected.len(),
            unreachable: report.unreachable.len(),
        });
        report
    }

    // ── Peer operations ─────────────────────────────────────────────────────

    /// Append a block announced by a peer if it extends our tip with a valid
    /// proof.
    pub async fn accept_block(&self, block: Block) -> Result<(), NodeError> {
        let accepted = block.clone();
        self.inner.chain.write().await.add_block(block)?;
        info!(index = accepted.index, hash = %accepted.hash, "accepted block from peer");
        self.emit(NodeEvent::BlockAccepted(accepted));
        Ok(())
    }

    /// Record a peer that registered with us and hand back our chain and
    /// peer list.  The address is not deduplicated.
    pub async fn register_peer(&self, node_address: &str) -> Result<RegisterResponse, NodeError> {
        if node_address.trim().is_empty() {
            return Err(NodeError::EmptyPeerAddress);
        }
        let response = {
            let mut chain = self.inner.chain.write().await;
            chain.add_peer(node_address);
            RegisterResponse::of(&chain)
        };
        info!(peer = %node_address, "peer registered");
        self.emit(NodeEvent::PeerRegistered(node_address.to_string()));
        Ok(response)
    }

    /// Register with `bootstrap` and adopt its chain and peer list.
    ///
    /// `own_address` is what we advertise; it defaults to the configured
    /// address and is filtered out of the adopted peers.  The bootstrap node
    /// itself is added if its list does not already name it.  The local pool
    /// survives.  Returns the new chain length.
    pub async fn register_with(
        &self,
        bootstrap: &str,
        own_address: Option<String>,
    ) -> Result<usize, NodeError> {
        if bootstrap.trim().is_empty() {
            return Err(NodeError::EmptyPeerAddress);
        }
        let own = own_address.unwrap_or_else(|| self.inner.config.advertised_address());
        let response = self
            .inner
            .network
            .register(bootstrap, &RegisterRequest::new(own.clone()))
            .await?;

        let difficulty = self.inner.chain.read().await.difficulty();
        let adopted = Blockchain::from_blocks(response.chain, difficulty)?;
        if !adopted.check_chain_validity() {
            if self.inner.config.verify_bootstrap_chain {
                return Err(NodeError::UntrustedBootstrap {
                    peer: bootstrap.to_string(),
                });
            }
            warn!(peer = %bootstrap, "adopting bootstrap chain that fails validation");
        }

        let mut peers: Vec<Peer> = response
            .peers
            .into_iter()
            .filter(|p| *p != own)
            .map(Peer::new)
            .collect();
        if !peers.iter().any(|p| p.node_address == bootstrap) {
            peers.push(Peer::new(bootstrap));
        }

        let new_length = {
            let mut chain = self.inner.chain.write().await;
            chain.adopt(adopted, peers);
            chain.len()
        };
        info!(peer = %bootstrap, new_length, "registered with bootstrap node");
        self.emit(NodeEvent::Bootstrapped {
            peer: bootstrap.to_string(),
            new_length,
        });
        Ok(new_length)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Abort any running proof-of-work search.  Searches started afterwards
    /// fail immediately.
    pub fn shutdown(&self) {
        self.inner.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.cancel.load(Ordering::SeqCst)
    }
}
