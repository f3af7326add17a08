use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use pc_transaction::Transaction;

use crate::BlockchainError;

/// Previous-hash marker carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// A single block in the postchain ledger.
///
/// The serialised field names and their order are the peer wire format and
/// the hashing encoding at the same time; reordering them changes every
/// block hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Sequential block height (genesis = 0).
    pub index: u64,

    /// Transactions sealed into this block, in pool order.
    pub transactions: Vec<Transaction>,

    /// Unix timestamp (seconds) when the block was assembled.
    pub timestamp: i64,

    /// Hex hash of the preceding block, `"0"` for genesis.
    pub previous_hash: String,

    /// Proof-of-work nonce.
    pub nonce: u64,

    /// Lower-case hex SHA-256 of the block encoded with an empty `hash`.
    pub hash: String,
}

/// Borrowed view used for hashing: identical shape to [`Block`] with the
/// hash field pinned to the empty string.
#[derive(Serialize)]
struct HashInput<'a> {
    index: u64,
    transactions: &'a [Transaction],
    timestamp: i64,
    previous_hash: &'a str,
    nonce: u64,
    hash: &'static str,
}

impl Block {
    /// Unsealed block with an explicit timestamp: nonce 0, empty hash.
    pub fn candidate(
        index: u64,
        previous_hash: impl Into<String>,
        transactions: Vec<Transaction>,
        timestamp: i64,
    ) -> Self {
        Self {
            index,
            transactions,
            timestamp,
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: String::new(),
        }
    }

    /// The fixed first block every chain starts with.
    pub fn genesis() -> Self {
        let mut genesis = Self::candidate(0, GENESIS_PREVIOUS_HASH, Vec::new(), 0);
        genesis.hash = genesis.compute_hash();
        genesis
    }

    /// SHA-256 over the canonical JSON encoding of this block with `hash`
    /// cleared.  Does not read or modify `self.hash`.
    pub fn compute_hash(&self) -> String {
        let input = HashInput {
            index: self.index,
            transactions: &self.transactions,
            timestamp: self.timestamp,
            previous_hash: &self.previous_hash,
            nonce: self.nonce,
            hash: "",
        };
        // Plain structs with string keys cannot fail to serialise.
        let bytes = serde_json::to_vec(&input).expect("block fields always serialise to JSON");
        hex::encode(Sha256::digest(&bytes))
    }

    /// True when the stored hash is the hash of the block's contents.
    pub fn hash_matches(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Structural checks applied to blocks decoded from peers or snapshots.
    ///
    /// This does not verify proof of work or linkage; see
    /// [`crate::Blockchain::check_chain_validity`] for that.
    pub fn check_fields(&self) -> Result<(), BlockchainError> {
        if !is_hex_digest(&self.hash) {
            return Err(BlockchainError::Decode(format!(
                "block #{} hash is not a 64-character lower-case hex digest",
                self.index
            )));
        }
        let genesis_marker = self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH;
        if !genesis_marker && !is_hex_digest(&self.previous_hash) {
            return Err(BlockchainError::Decode(format!(
                "block #{} previous_hash is not a hex digest",
                self.index
            )));
        }
        Ok(())
    }
}

fn is_hex_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
