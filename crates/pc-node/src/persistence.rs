//! Chain snapshot on disk.
//!
//! The snapshot is the serde form of [`Blockchain`]:
//! `{difficulty, unconfirmed_transactions, chain, peers}`.
use std::{fs, io::ErrorKind, path::Path};

use pc_blockchain::Blockchain;
use tracing::{info, warn};

use crate::error::NodeError;

/// Read a snapshot.  A missing file is not an error and yields `None`.
pub fn load(path: &Path) -> Result<Option<Blockchain>, NodeError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let chain: Blockchain = serde_json::from_slice(&bytes)
        .map_err(|e| NodeError::Serialisation(format!("{}: {e}", path.display())))?;
    if !chain.check_chain_validity() {
        warn!(path = %path.display(), "loaded snapshot fails chain validation");
    }
    info!(
        path = %path.display(),
        length = chain.len(),
        pending = chain.pending_transactions().len(),
        peers = chain.peers().len(),
        "snapshot loaded"
    );
    Ok(Some(chain))
}

/// Write a snapshot through a sibling temp file so a crash never leaves a
/// half-written file behind.
pub fn save(path: &Path, chain: &Blockchain) -> Result<(), NodeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_vec_pretty(chain).map_err(|e| NodeError::Serialisation(e.to_string()))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), length = chain.len(), "snapshot saved");
    Ok(())
}
