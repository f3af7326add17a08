use std::sync::atomic::AtomicBool;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use pc_transaction::Transaction;

use crate::{block::Block, error::BlockchainError, pow, DEFAULT_DIFFICULTY};

/// Another node this chain consults during consensus and announces blocks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub node_address: String,
}

impl Peer {
    pub fn new(node_address: impl Into<String>) -> Self {
        Self {
            node_address: node_address.into(),
        }
    }
}

/// The append-only chain of [`Block`]s held by one node, together with its
/// pending transaction pool and registered peers.
///
/// Invariants maintained by this type (including values produced by
/// deserialisation):
/// - Always starts with the canonical genesis block.
/// - Block indices are contiguous starting from 0.
/// - Every hash field is a well-formed hex digest.
///
/// Linkage and proof of work are only guaranteed for blocks appended through
/// [`Blockchain::add_block`]; chains decoded from elsewhere are checked with
/// [`Blockchain::check_chain_validity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChainSnapshot")]
pub struct Blockchain {
    difficulty: u32,
    #[serde(rename = "unconfirmed_transactions")]
    pending: Vec<Transaction>,
    #[serde(rename = "chain")]
    blocks: Vec<Block>,
    peers: Vec<Peer>,
}

/// Unchecked serialised form of a [`Blockchain`].
#[derive(Deserialize)]
struct ChainSnapshot {
    #[serde(default = "default_difficulty")]
    difficulty: u32,
    #[serde(default)]
    unconfirmed_transactions: Vec<Transaction>,
    chain: Vec<Block>,
    #[serde(default)]
    peers: Vec<Peer>,
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

impl TryFrom<ChainSnapshot> for Blockchain {
    type Error = BlockchainError;

    fn try_from(snapshot: ChainSnapshot) -> Result<Self, Self::Error> {
        pow::check_difficulty(snapshot.difficulty)?;
        let mut chain = Self::from_blocks(snapshot.chain, snapshot.difficulty)?;
        chain.pending = snapshot.unconfirmed_transactions;
        chain.peers = snapshot.peers;
        Ok(chain)
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Initialise a new chain with only the genesis block.
    pub fn new() -> Self {
        Self::with_difficulty(DEFAULT_DIFFICULTY)
    }

    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            pending: Vec::new(),
            blocks: vec![Block::genesis()],
            peers: Vec::new(),
        }
    }

    /// Rebuild a chain value from a block sequence received from a peer or a
    /// snapshot.
    ///
    /// Only structure is checked here (genesis, contiguous indices, digest
    /// formats); a chain with broken linkage or proof is still returned so
    /// that callers can audit it with [`Blockchain::check_chain_validity`].
    pub fn from_blocks(blocks: Vec<Block>, difficulty: u32) -> Result<Self, BlockchainError> {
        let genesis = blocks
            .first()
            .ok_or_else(|| BlockchainError::Decode("chain has no blocks".into()))?;
        if *genesis != Block::genesis() {
            return Err(BlockchainError::Decode(
                "first block is not the canonical genesis block".into(),
            ));
        }

        for (position, block) in blocks.iter().enumerate() {
            if block.index != position as u64 {
                return Err(BlockchainError::Decode(format!(
                    "block at position {position} has index {}",
                    block.index
                )));
            }
            block.check_fields()?;
        }

        Ok(Self {
            difficulty,
            pending: Vec::new(),
            blocks,
            peers: Vec::new(),
        })
    }

    /// Number of blocks in the chain (including genesis).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// The most recent block.
    pub fn tip(&self) -> &Block {
        // Every constructor guarantees at least the genesis block.
        self.blocks.last().expect("chain always holds the genesis block")
    }

    /// All blocks in the chain.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Return a reference to a block by its index.
    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    /// Transactions waiting to be mined, oldest first.
    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Registered peer addresses in registration order.
    pub fn peer_addresses(&self) -> Vec<String> {
        self.peers.iter().map(|p| p.node_address.clone()).collect()
    }

    /// Register another node.  Duplicates are kept.
    pub fn add_peer(&mut self, node_address: impl Into<String>) {
        self.peers.push(Peer::new(node_address));
    }

    /// Queue a transaction for the next mined block.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), BlockchainError> {
        tx.validate()?;
        self.pending.push(tx);
        Ok(())
    }

    /// True when `block.hash` is the block's real hash and meets this
    /// chain's difficulty.
    pub fn is_valid_proof(&self, block: &Block) -> bool {
        proof_holds(block, self.difficulty)
    }

    /// Append `block` if it extends the tip and carries a valid proof.
    ///
    /// The chain is left untouched on failure.
    pub fn add_block(&mut self, block: Block) -> Result<(), BlockchainError> {
        let tip_hash = &self.tip().hash;
        if block.previous_hash != *tip_hash {
            return Err(BlockchainError::InvalidPreviousHash {
                expected: tip_hash.clone(),
                found: block.previous_hash,
            });
        }
        if !self.is_valid_proof(&block) {
            return Err(BlockchainError::InvalidProof { index: block.index });
        }
        self.blocks.push(block);
        Ok(())
    }

    /// Audit the full sequence: every non-genesis block must link to its
    /// predecessor and carry a valid proof.
    pub fn check_chain_validity(&self) -> bool {
        links_and_proofs_hold(&self.blocks, self.difficulty)
    }

    /// Snapshot the pool into an unsealed block on top of the current tip.
    ///
    /// Returns `None` when there is nothing to mine.
    pub fn candidate_block(&self, timestamp: i64) -> Option<Block> {
        if self.pending.is_empty() {
            return None;
        }
        let tip = self.tip();
        Some(Block::candidate(
            tip.index + 1,
            tip.hash.clone(),
            self.pending.clone(),
            timestamp,
        ))
    }

    /// Append a sealed block and drop exactly the transactions it contains
    /// from the pool.  Transactions queued after the candidate was taken stay
    /// pending.
    pub fn commit_mined(&mut self, block: Block) -> Result<(), BlockchainError> {
        let included = block.transactions.clone();
        self.add_block(block)?;
        for tx in &included {
            if let Some(position) = self.pending.iter().position(|p| p == tx) {
                self.pending.remove(position);
            }
        }
        Ok(())
    }

    /// Mine the whole pending pool into one block on this thread.
    ///
    /// Returns `Ok(false)` without touching the chain when the pool is empty.
    pub fn mine_block(&mut self, cancel: &AtomicBool) -> Result<bool, BlockchainError> {
        let Some(candidate) = self.candidate_block(Utc::now().timestamp()) else {
            return Ok(false);
        };
        let sealed = pow::seal(candidate, self.difficulty, cancel)?;
        self.commit_mined(sealed)?;
        Ok(true)
    }

    /// Replace the local blocks with `other`'s if `other` is longer and
    /// valid under this chain's difficulty.
    ///
    /// This is the longest-chain conflict resolution rule used during
    /// consensus.  Pool, peers and difficulty are kept.
    pub fn sync_from(&mut self, other: Blockchain) -> bool {
        if other.len() > self.len() && links_and_proofs_hold(&other.blocks, self.difficulty) {
            self.blocks = other.blocks;
            true
        } else {
            false
        }
    }

    /// Put back at the front of the pool every transaction from `orphaned`
    /// that no block in the chain carries.  Used after a mined block was
    /// displaced by a longer peer chain.  Returns how many were requeued.
    pub fn requeue(&mut self, orphaned: &[Transaction]) -> usize {
        let missing: Vec<Transaction> = orphaned
            .iter()
            .filter(|tx| {
                !self.blocks.iter().any(|b| b.transactions.contains(tx)) && !self.pending.contains(tx)
            })
            .cloned()
            .collect();
        let count = missing.len();
        self.pending.splice(0..0, missing);
        count
    }

    /// Take over a bootstrap node's blocks and peer list without auditing
    /// them.  The local pool and difficulty are kept.
    pub fn adopt(&mut self, other: Blockchain, peers: Vec<Peer>) {
        self.blocks = other.blocks;
        self.peers = peers;
    }
}

fn proof_holds(block: &Block, difficulty: u32) -> bool {
    pow::meets_difficulty(&block.hash, difficulty) && block.hash_matches()
}

fn links_and_proofs_hold(blocks: &[Block], difficulty: u32) -> bool {
    blocks
        .windows(2)
        .all(|pair| pair[1].previous_hash == pair[0].hash && proof_holds(&pair[1], difficulty))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    fn mined_chain(blocks: usize) -> Blockchain {
        let mut chain = Blockchain::with_difficulty(1);
        for i in 0..blocks {
            chain
                .add_transaction(Transaction::at("a", format!("post {i}"), i as i64))
                .unwrap();
            assert!(chain.mine_block(&no_cancel()).unwrap());
        }
        chain
    }

    #[test]
    fn new_chain_is_valid() {
        let chain = Blockchain::new();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.difficulty(), DEFAULT_DIFFICULTY);
        assert!(chain.check_chain_validity());
    }

    #[test]
    fn mining_scenario_at_difficulty_two() {
        let mut chain = Blockchain::with_difficulty(2);
        let h0 = chain.tip().hash.clone();

        chain.add_transaction(Transaction::at("a", "hi", 1)).unwrap();
        assert!(chain.mine_block(&no_cancel()).unwrap());

        let block1 = chain.tip();
        assert_eq!(block1.index, 1);
        assert_eq!(block1.previous_hash, h0);
        assert!(block1.hash.starts_with("00"));
        assert_eq!(block1.transactions, vec![Transaction::at("a", "hi", 1)]);
        assert_eq!(chain.len(), 2);
        assert!(chain.pending_transactions().is_empty());

        assert!(!chain.mine_block(&no_cancel()).unwrap());
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn mining_empty_pool_changes_nothing() {
        let mut chain = mined_chain(1);
        let before = chain.clone();
        assert!(!chain.mine_block(&no_cancel()).unwrap());
        assert_eq!(chain, before);
    }

    #[test]
    fn add_transaction_rejects_empty_fields() {
        let mut chain = Blockchain::new();
        assert!(chain.add_transaction(Transaction::at("", "x", 0)).is_err());
        assert!(chain.pending_transactions().is_empty());
    }

    #[test]
    fn add_block_rejects_wrong_previous_hash() {
        let mut chain = mined_chain(1);
        let mut other = Blockchain::with_difficulty(1);
        other.add_transaction(Transaction::at("b", "fork", 5)).unwrap();
        other.mine_block(&no_cancel()).unwrap();

        let before = chain.clone();
        let err = chain.add_block(other.tip().clone()).unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidPreviousHash { .. }));
        assert_eq!(chain, before);
    }

    #[test]
    fn add_block_rejects_invalid_proof() {
        let mut chain = Blockchain::with_difficulty(1);
        let cancel = no_cancel();

        // Correct linkage, hash of the content, but too easy for the chain.
        let mut easy = Block::candidate(1, chain.tip().hash.clone(), vec![], 3);
        while easy.compute_hash().starts_with('0') {
            easy.nonce += 1;
        }
        easy.hash = easy.compute_hash();
        assert!(matches!(
            chain.add_block(easy),
            Err(BlockchainError::InvalidProof { index: 1 })
        ));

        // Enough leading zeros, but not the block's hash.
        let mut forged = pow::seal(
            Block::candidate(1, chain.tip().hash.clone(), vec![], 3),
            1,
            &cancel,
        )
        .unwrap();
        forged.timestamp += 1;
        assert!(matches!(
            chain.add_block(forged),
            Err(BlockchainError::InvalidProof { .. })
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn linkage_is_checked_before_proof() {
        let mut chain = Blockchain::with_difficulty(1);
        let mut bad = Block::candidate(1, "f".repeat(64), vec![], 0);
        bad.hash = "f".repeat(64);
        assert!(matches!(
            chain.add_block(bad),
            Err(BlockchainError::InvalidPreviousHash { .. })
        ));
    }

    #[test]
    fn every_accepted_block_meets_the_invariant() {
        let chain = mined_chain(4);
        for block in &chain.blocks()[1..] {
            assert!(block.hash_matches());
            assert!(pow::meets_difficulty(&block.hash, chain.difficulty()));
        }
    }

    #[test]
    fn flipping_any_previous_hash_breaks_validity() {
        let chain = mined_chain(3);
        assert!(chain.check_chain_validity());

        for i in 1..chain.len() {
            let mut tampered = chain.clone();
            tampered.blocks[i].previous_hash = "a".repeat(64);
            assert!(!tampered.check_chain_validity(), "tampering block {i}");
        }
    }

    #[test]
    fn tampered_content_breaks_validity() {
        let mut chain = mined_chain(2);
        chain.blocks[1].transactions[0].content = "edited".into();
        assert!(!chain.check_chain_validity());
    }

    #[test]
    fn commit_keeps_transactions_queued_during_search() {
        let mut chain = Blockchain::with_difficulty(1);
        chain.add_transaction(Transaction::at("a", "first", 1)).unwrap();
        let candidate = chain.candidate_block(10).unwrap();

        chain.add_transaction(Transaction::at("b", "late", 2)).unwrap();
        let sealed = pow::seal(candidate, 1, &no_cancel()).unwrap();
        chain.commit_mined(sealed).unwrap();

        assert_eq!(
            chain.pending_transactions(),
            &[Transaction::at("b", "late", 2)]
        );
    }

    #[test]
    fn commit_against_moved_tip_keeps_pool() {
        let mut chain = Blockchain::with_difficulty(1);
        chain.add_transaction(Transaction::at("a", "x", 1)).unwrap();
        let stale = pow::seal(chain.candidate_block(10).unwrap(), 1, &no_cancel()).unwrap();
        assert!(chain.mine_block(&no_cancel()).unwrap());

        chain.add_transaction(Transaction::at("a", "y", 2)).unwrap();
        let before = chain.clone();
        assert!(chain.commit_mined(stale).is_err());
        assert_eq!(chain, before);
    }

    #[test]
    fn requeue_restores_only_orphaned_transactions() {
        let mut ours = Blockchain::with_difficulty(1);
        ours.add_transaction(Transaction::at("me", "lost", 1)).unwrap();
        ours.mine_block(&no_cancel()).unwrap();
        let orphaned = ours.tip().transactions.clone();

        let mut theirs = Blockchain::with_difficulty(1);
        theirs.add_transaction(Transaction::at("x", "one", 1)).unwrap();
        theirs.mine_block(&no_cancel()).unwrap();
        theirs.add_transaction(Transaction::at("x", "two", 2)).unwrap();
        theirs.mine_block(&no_cancel()).unwrap();

        ours.add_transaction(Transaction::at("me", "queued", 3)).unwrap();
        assert!(ours.sync_from(theirs));
        assert_eq!(ours.requeue(&orphaned), 1);
        assert_eq!(ours.pending_transactions()[0].content, "lost");
        assert_eq!(ours.pending_transactions()[1].content, "queued");

        // Already pending or already on chain: nothing to do.
        assert_eq!(ours.requeue(&orphaned), 0);
        let on_chain = ours.tip().transactions.clone();
        assert_eq!(ours.requeue(&on_chain), 0);
    }

    #[test]
    fn peers_allow_duplicates() {
        let mut chain = Blockchain::new();
        chain.add_peer("http://a");
        chain.add_peer("http://a");
        assert_eq!(chain.peer_addresses(), vec!["http://a", "http://a"]);
    }

    #[test]
    fn sync_from_longer_valid_chain() {
        let mut local = Blockchain::with_difficulty(1);
        local.add_peer("http://peer");
        local.add_transaction(Transaction::at("me", "queued", 1)).unwrap();
        let remote = mined_chain(2);

        assert!(local.sync_from(remote.clone()));
        assert_eq!(local.blocks(), remote.blocks());
        assert_eq!(local.peer_addresses(), vec!["http://peer"]);
        assert_eq!(local.pending_transactions().len(), 1);
    }

    #[test]
    fn sync_from_shorter_or_invalid_chain_ignored() {
        let mut local = mined_chain(2);
        let before = local.clone();
        assert!(!local.sync_from(mined_chain(1)));
        assert!(!local.sync_from(mined_chain(2)));

        let mut invalid = mined_chain(4);
        invalid.blocks[2].previous_hash = "b".repeat(64);
        assert!(!local.sync_from(invalid));
        assert_eq!(local, before);
    }

    #[test]
    fn from_blocks_checks_structure_only() {
        let chain = mined_chain(2);
        let rebuilt = Blockchain::from_blocks(chain.blocks().to_vec(), 1).unwrap();
        assert!(rebuilt.check_chain_validity());

        let mut broken = chain.blocks().to_vec();
        broken[2].previous_hash = "c".repeat(64);
        let rebuilt = Blockchain::from_blocks(broken, 1).unwrap();
        assert!(!rebuilt.check_chain_validity());
    }

    #[test]
    fn from_blocks_rejects_malformed_dumps() {
        assert!(matches!(
            Blockchain::from_blocks(vec![], 1),
            Err(BlockchainError::Decode(_))
        ));

        let mut foreign_genesis = Block::genesis();
        foreign_genesis.timestamp = 1;
        foreign_genesis.hash = foreign_genesis.compute_hash();
        assert!(Blockchain::from_blocks(vec![foreign_genesis], 1).is_err());

        let mut gap = mined_chain(2).blocks().to_vec();
        gap.remove(1);
        assert!(Blockchain::from_blocks(gap, 1).is_err());
    }

    #[test]
    fn snapshot_round_trip_uses_stable_names() {
        let mut chain = mined_chain(1);
        chain.add_peer("http://peer");
        chain.add_transaction(Transaction::at("x", "y", 3)).unwrap();

        let value = serde_json::to_value(&chain).unwrap();
        for key in ["difficulty", "unconfirmed_transactions", "chain", "peers"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["peers"][0]["node_address"], "http://peer");

        let restored: Blockchain = serde_json::from_value(value).unwrap();
        assert_eq!(restored, chain);
    }

    #[test]
    fn snapshot_with_unreachable_difficulty_is_rejected() {
        let mut value = serde_json::to_value(Blockchain::with_difficulty(1)).unwrap();
        value["difficulty"] = serde_json::json!(65);
        let result: Result<Blockchain, _> = serde_json::from_value(value.clone());
        assert!(result.is_err());

        value["difficulty"] = serde_json::json!(64);
        let restored: Blockchain = serde_json::from_value(value).unwrap();
        assert_eq!(restored.difficulty(), 64);
    }

    #[test]
    fn snapshot_without_chain_is_rejected() {
        let result: Result<Blockchain, _> =
            serde_json::from_str(r#"{"difficulty":2,"chain":[],"peers":[]}"#);
        assert!(result.is_err());
    }
}
