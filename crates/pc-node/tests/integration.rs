//! Multi-node tests over an in-memory network.
//!
//! `LocalNetwork` routes peer calls straight to other `Node` handles, so the
//! whole mine → consensus → announce path runs without sockets.
use std::{
    collections::HashMap,
    sync::{atomic::AtomicBool, Arc, RwLock},
};

use async_trait::async_trait;
use pc_blockchain::{Block, Blockchain, BlockchainError, NewTransaction, Transaction};
use pc_node::{MineOutcome, Node, NodeConfig, NodeError, NodeState};
use pc_sync::{ChainDump, PeerNetwork, PushOutcome, RegisterRequest, RegisterResponse, SyncError};

const DIFFICULTY: u32 = 1;

#[derive(Default)]
struct LocalNetwork {
    nodes: RwLock<HashMap<String, Node>>,
}

impl LocalNetwork {
    fn lookup(&self, peer: &str) -> Result<Node, SyncError> {
        self.nodes
            .read()
            .unwrap()
            .get(peer)
            .cloned()
            .ok_or_else(|| SyncError::PeerUnreachable {
                peer: peer.to_string(),
                reason: "no such node".into(),
            })
    }
}

#[async_trait]
impl PeerNetwork for LocalNetwork {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainDump, SyncError> {
        Ok(self.lookup(peer)?.chain_dump().await)
    }

    async fn push_block(&self, peer: &str, block: &Block) -> Result<PushOutcome, SyncError> {
        match self.lookup(peer)?.accept_block(block.clone()).await {
            Ok(()) => Ok(PushOutcome::Accepted),
            Err(e) => Ok(PushOutcome::Rejected(e.to_string())),
        }
    }

    async fn register(
        &self,
        peer: &str,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, SyncError> {
        self.lookup(peer)?
            .register_peer(&request.node_address)
            .await
            .map_err(|e| SyncError::Decode {
                peer: peer.to_string(),
                reason: e.to_string(),
            })
    }
}

fn spawn(network: &Arc<LocalNetwork>, name: &str, chain: Blockchain) -> Node {
    spawn_with(network, name, chain, NodeConfig::default())
}

fn spawn_with(
    network: &Arc<LocalNetwork>,
    name: &str,
    chain: Blockchain,
    config: NodeConfig,
) -> Node {
    let (node, _events) = Node::new(config, chain, network.clone());
    network
        .nodes
        .write()
        .unwrap()
        .insert(name.to_string(), node.clone());
    node
}

async fn post(node: &Node, author: &str, content: &str) {
    node.submit_transaction(NewTransaction::new(author, content))
        .await
        .unwrap();
}

async fn mine_kept(node: &Node) -> Block {
    match node.mine().await.unwrap() {
        MineOutcome::Mined { block, kept: true } => block,
        other => panic!("expected a kept block, got {other:?}"),
    }
}

#[tokio::test]
async fn mined_block_reaches_registered_peer() {
    let network = Arc::new(LocalNetwork::default());
    let a = spawn(&network, "A", Blockchain::with_difficulty(DIFFICULTY));
    let b = spawn(&network, "B", Blockchain::with_difficulty(DIFFICULTY));

    assert_eq!(b.register_with("A", Some("B".into())).await.unwrap(), 1);
    assert_eq!(a.peers().await, vec!["B"]);
    assert_eq!(b.peers().await, vec!["A"]);

    post(&a, "alice", "hello").await;
    let block = mine_kept(&a).await;

    assert_eq!(block.index, 1);
    assert_eq!(b.len().await, 2);
    assert_eq!(b.chain_snapshot().await.tip().hash, block.hash);
    assert!(a.pending().await.is_empty());
    assert_eq!(a.state(), NodeState::Idle);
}

#[tokio::test]
async fn empty_pool_mines_nothing() {
    let network = Arc::new(LocalNetwork::default());
    let a = spawn(&network, "A", Blockchain::with_difficulty(DIFFICULTY));
    assert_eq!(a.mine().await.unwrap(), MineOutcome::NothingToMine);
    assert_eq!(a.len().await, 1);
}

#[tokio::test]
async fn consensus_adopts_longer_chain_and_keeps_pool() {
    let network = Arc::new(LocalNetwork::default());
    let a = spawn(&network, "A", Blockchain::with_difficulty(DIFFICULTY));
    for i in 0..2 {
        post(&a, "a", &format!("post {i}")).await;
        mine_kept(&a).await;
    }

    let mut local = Blockchain::with_difficulty(DIFFICULTY);
    local.add_peer("A");
    let b = spawn(&network, "B", local);
    post(&b, "bob", "waiting").await;

    assert!(b.consensus().await);
    assert_eq!(b.len().await, 3);
    assert_eq!(b.pending().await.len(), 1);
    assert_eq!(b.peers().await, vec!["A"]);

    // Equal length now: nothing to do.
    assert!(!b.consensus().await);
}

#[tokio::test]
async fn displaced_block_returns_its_posts_to_the_pool() {
    let network = Arc::new(LocalNetwork::default());
    let a = spawn(&network, "A", Blockchain::with_difficulty(DIFFICULTY));
    for i in 0..2 {
        post(&a, "a", &format!("post {i}")).await;
        mine_kept(&a).await;
    }

    let mut local = Blockchain::with_difficulty(DIFFICULTY);
    local.add_peer("A");
    let b = spawn(&network, "B", local);
    post(&b, "bob", "lost in a fork").await;

    match b.mine().await.unwrap() {
        MineOutcome::Mined { block, kept } => {
            assert!(!kept);
            assert_eq!(block.index, 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(b.len().await, 3);
    let pending = b.pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].content, "lost in a fork");
}

#[tokio::test]
async fn tip_moved_during_search_is_mined_again_on_the_new_tip() {
    const SLOW: u32 = 4;
    let network = Arc::new(LocalNetwork::default());
    let a = spawn(&network, "A", Blockchain::with_difficulty(SLOW));

    let mut rival = Blockchain::with_difficulty(SLOW);
    rival.add_transaction(Transaction::at("rival", "first", 1)).unwrap();
    rival.mine_block(&AtomicBool::new(false)).unwrap();
    let competing = rival.tip().clone();

    post(&a, "alice", "racing").await;
    let miner = tokio::spawn({
        let a = a.clone();
        async move { a.mine().await }
    });
    while a.state() != NodeState::Mining {
        tokio::task::yield_now().await;
    }
    a.accept_block(competing.clone()).await.unwrap();

    let block = match miner.await.unwrap().unwrap() {
        MineOutcome::Mined { block, kept: true } => block,
        other => panic!("expected a kept block, got {other:?}"),
    };
    assert_eq!(block.index, 2);
    assert_eq!(block.previous_hash, competing.hash);

    let chain = a.chain_snapshot().await;
    assert_eq!(chain.len(), 3);
    assert!(chain.check_chain_validity());
    assert!(a.pending().await.is_empty());
}

#[tokio::test]
async fn back_to_back_local_mines_all_reach_peer() {
    let network = Arc::new(LocalNetwork::default());
    let a = spawn(&network, "A", Blockchain::with_difficulty(DIFFICULTY));
    let b = spawn(&network, "B", Blockchain::with_difficulty(DIFFICULTY));
    b.register_with("A", Some("B".into())).await.unwrap();

    post(&a, "alice", "one").await;
    let (first, second) = tokio::join!(a.mine(), async {
        post(&a, "alice", "two").await;
        a.mine().await
    });
    first.unwrap();
    second.unwrap();

    assert!(a.pending().await.is_empty());
    assert!(a.len().await >= 2);
    assert_eq!(
        b.chain_snapshot().await.blocks(),
        a.chain_snapshot().await.blocks()
    );
}

#[tokio::test]
async fn diverged_peer_rejects_announcement() {
    let network = Arc::new(LocalNetwork::default());
    let b = spawn(&network, "B", Blockchain::with_difficulty(DIFFICULTY));
    post(&b, "b", "b's own block").await;
    mine_kept(&b).await;

    let mut local = Blockchain::with_difficulty(DIFFICULTY);
    local.add_peer("B");
    let a = spawn(&network, "A", local);
    post(&a, "a", "a's block").await;

    // B is as long as A after mining, so consensus keeps A's block and the
    // announcement is refused by B.
    let block = mine_kept(&a).await;
    assert_eq!(b.len().await, 2);
    assert_ne!(b.chain_snapshot().await.tip().hash, block.hash);

    let report = a.announce(&block).await;
    assert_eq!(report.rejected, vec!["B"]);
    assert!(report.accepted.is_empty());
}

#[tokio::test]
async fn register_with_drops_own_address_and_keeps_pool() {
    let network = Arc::new(LocalNetwork::default());
    let a = spawn(&network, "A", Blockchain::with_difficulty(DIFFICULTY));
    a.register_peer("C").await.unwrap();
    post(&a, "a", "on chain").await;
    mine_kept(&a).await;

    let b = spawn(&network, "B", Blockchain::with_difficulty(DIFFICULTY));
    post(&b, "b", "mine later").await;

    assert_eq!(b.register_with("A", Some("B".into())).await.unwrap(), 2);
    assert_eq!(a.peers().await, vec!["C", "B"]);
    assert_eq!(b.peers().await, vec!["C", "A"]);
    assert_eq!(b.pending().await.len(), 1);
}

#[tokio::test]
async fn register_peer_rejects_empty_address() {
    let network = Arc::new(LocalNetwork::default());
    let a = spawn(&network, "A", Blockchain::with_difficulty(DIFFICULTY));
    assert!(matches!(
        a.register_peer("  ").await,
        Err(NodeError::EmptyPeerAddress)
    ));
    assert!(a.peers().await.is_empty());
}

fn tampered_chain() -> Blockchain {
    let cancel = AtomicBool::new(false);
    let mut honest = Blockchain::with_difficulty(DIFFICULTY);
    honest
        .add_transaction(Transaction::at("x", "y", 1))
        .unwrap();
    honest.mine_block(&cancel).unwrap();

    let mut blocks = honest.blocks().to_vec();
    blocks[1].transactions[0].content = "rewritten".into();
    Blockchain::from_blocks(blocks, DIFFICULTY).unwrap()
}

#[tokio::test]
async fn invalid_bootstrap_chain_is_adopted_unless_verification_is_on() {
    let network = Arc::new(LocalNetwork::default());
    spawn(&network, "A", tampered_chain());

    let strict = spawn_with(
        &network,
        "S",
        Blockchain::with_difficulty(DIFFICULTY),
        NodeConfig {
            verify_bootstrap_chain: true,
            ..NodeConfig::default()
        },
    );
    assert!(matches!(
        strict.register_with("A", Some("S".into())).await,
        Err(NodeError::UntrustedBootstrap { .. })
    ));
    assert_eq!(strict.len().await, 1);
    assert!(strict.peers().await.is_empty());

    let lenient = spawn(&network, "L", Blockchain::with_difficulty(DIFFICULTY));
    assert_eq!(lenient.register_with("A", Some("L".into())).await.unwrap(), 2);
    assert!(!lenient.chain_view().await.is_valid);
}

#[tokio::test]
async fn unreachable_bootstrap_leaves_state_alone() {
    let network = Arc::new(LocalNetwork::default());
    let b = spawn(&network, "B", Blockchain::with_difficulty(DIFFICULTY));
    assert!(matches!(
        b.register_with("nowhere", None).await,
        Err(NodeError::Sync(SyncError::PeerUnreachable { .. }))
    ));
    assert_eq!(b.len().await, 1);
}

#[tokio::test]
async fn shutdown_cancels_mining_and_keeps_pool() {
    let network = Arc::new(LocalNetwork::default());
    // 64 leading zeros is unreachable; only cancellation ends the search.
    let a = spawn(&network, "A", Blockchain::with_difficulty(64));
    post(&a, "a", "never mined").await;

    let miner = {
        let a = a.clone();
        tokio::spawn(async move { a.mine().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    a.shutdown();

    let result = miner.await.unwrap();
    assert!(matches!(
        result,
        Err(NodeError::Blockchain(BlockchainError::MiningCancelled))
    ));
    assert_eq!(a.len().await, 1);
    assert_eq!(a.pending().await.len(), 1);
    assert_eq!(a.state(), NodeState::Idle);
}

#[tokio::test]
async fn status_reports_counts() {
    let network = Arc::new(LocalNetwork::default());
    let a = spawn(&network, "A", Blockchain::with_difficulty(DIFFICULTY));
    a.register_peer("B").await.unwrap();
    post(&a, "a", "1").await;
    post(&a, "a", "2").await;

    let status = a.status().await;
    assert_eq!(status.state, NodeState::Idle);
    assert_eq!(status.length, 1);
    assert_eq!(status.pending, 2);
    assert_eq!(status.peers, 1);
    assert_eq!(status.difficulty, DIFFICULTY);
    assert_eq!(status.tip, Block::genesis().hash);
}

#[tokio::test]
async fn submissions_are_validated() {
    let network = Arc::new(LocalNetwork::default());
    let a = spawn(&network, "A", Blockchain::with_difficulty(DIFFICULTY));
    assert!(matches!(
        a.submit_transaction(NewTransaction::new("", "x")).await,
        Err(NodeError::Transaction(_))
    ));
    assert!(a.pending().await.is_empty());
}
