//! Loading of pretrained model artifacts from disk
//!
//! Model files may be pinned by a SHA-256 checksum in configuration; a file
//! that does not match is refused so the caller can fall back to simulation.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// Maximum accepted size for a single model file (256MB)
pub const MAX_ARTIFACT_BYTES: u64 = 256 * 1024 * 1024;

/// Hex-encoded SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Read a model file, verifying its checksum when one is configured
pub fn read_verified(path: &Path, expected_sha256: Option<&str>) -> Result<Vec<u8>> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Model artifact {:?} not found", path))?
        .len();
    if size > MAX_ARTIFACT_BYTES {
        anyhow::bail!(
            "Model artifact {:?} is {} bytes, limit is {}",
            path,
            size,
            MAX_ARTIFACT_BYTES
        );
    }

    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read model artifact {:?}", path))?;

    if let Some(expected) = expected_sha256 {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            anyhow::bail!(
                "Checksum mismatch for {:?}: expected {}, got {}",
                path,
                expected,
                actual
            );
        }
        debug!(path = ?path, "Model artifact checksum verified");
    }

    Ok(bytes)
}
