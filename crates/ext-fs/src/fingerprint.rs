//! SHA-256 fingerprints used for cache vary hashes
//!
//! A fingerprint is the lowercase hex digest of some content. Structured
//! values are fingerprinted through their JSON encoding, so anything that
//! serializes the same hashes the same.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Hex SHA-256 digest of raw content.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Hex SHA-256 digest of the JSON encoding of `value`.
pub fn fingerprint_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let encoded = serde_json::to_vec(value).map_err(|e| Error::Fingerprint {
        message: e.to_string(),
    })?;
    Ok(fingerprint(&encoded))
}
