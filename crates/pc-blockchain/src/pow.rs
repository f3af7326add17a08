//! Nonce search for proof of work.
//!
//! The search works on its own copy of the candidate and never touches a
//! [`crate::Blockchain`], so callers can run it without holding any lock.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::{Block, BlockchainError, MAX_DIFFICULTY};

/// Reject a difficulty no SHA-256 hex digest can meet.
pub fn check_difficulty(difficulty: u32) -> Result<(), BlockchainError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(BlockchainError::UnreachableDifficulty(difficulty));
    }
    Ok(())
}

/// True when `hash` starts with `difficulty` `'0'` hex characters.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let width = difficulty as usize;
    hash.len() >= width && hash.bytes().take(width).all(|b| b == b'0')
}

/// Find the first nonce, counting up from 0, whose block hash meets
/// `difficulty`.
///
/// Returns the nonce together with the matching hash.  The search checks
/// `cancel` before every attempt and gives up with
/// [`BlockchainError::MiningCancelled`] once it is set.
pub fn mine_nonce(
    candidate: &Block,
    difficulty: u32,
    cancel: &AtomicBool,
) -> Result<(u64, String), BlockchainError> {
    check_difficulty(difficulty)?;
    let mut block = candidate.clone();
    block.nonce = 0;

    loop {
        if cancel.load(Ordering::Relaxed) {
            debug!(index = block.index, nonce = block.nonce, "nonce search cancelled");
            return Err(BlockchainError::MiningCancelled);
        }

        let hash = block.compute_hash();
        if meets_difficulty(&hash, difficulty) {
            debug!(index = block.index, nonce = block.nonce, "nonce found");
            return Ok((block.nonce, hash));
        }

        block.nonce = block
            .nonce
            .checked_add(1)
            .ok_or(BlockchainError::NonceExhausted)?;
    }
}

/// Run [`mine_nonce`] and return the candidate with its nonce and hash filled in.
pub fn seal(candidate: Block, difficulty: u32, cancel: &AtomicBool) -> Result<Block, BlockchainError> {
    let (nonce, hash) = mine_nonce(&candidate, difficulty, cancel)?;
    Ok(Block {
        nonce,
        hash,
        ..candidate
    })
}
