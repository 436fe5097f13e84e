//! Corpus fingerprint used to invalidate the shared index

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use crate::error::{Error, Result};

/// SHA-256 over every document's path, byte length and modification time
pub fn corpus_fingerprint(paths: &[PathBuf]) -> Result<String> {
    let mut hasher = Sha256::new();

    for path in paths {
        let display = path.display().to_string();
        let metadata =
            std::fs::metadata(path).map_err(|e| Error::pdf(display.clone(), e.to_string()))?;

        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        hasher.update(display.as_bytes());
        hasher.update([0u8]);
        hasher.update(metadata.len().to_le_bytes());
        hasher.update(modified.to_le_bytes());
    }

    Ok(hex::encode(hasher.finalize()))
}
