//! Canonical byte representation used for signing, hashing, and the on-disk
//! audit/policy encodings.
//!
//! The wire format mandates sorted keys and no unknown fields; this is
//! RFC 8785 JSON Canonicalization, applied consistently before anything is
//! signed or hashed.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("failed to serialize value to JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JCS canonicalization failed: {0}")]
    Jcs(String),
}

/// Serializes `value` to its canonical (RFC 8785) byte form.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let json = serde_json::to_value(value)?;
    serde_jcs::to_vec(&json).map_err(|e| CanonicalError::Jcs(e.to_string()))
}

/// Serializes an arbitrary `serde_json::Value` to its canonical byte form,
/// used when a field subset must be removed before canonicalization (e.g.
/// stripping `signature` before computing the signed digest).
pub fn canonical_bytes_value(value: &serde_json::Value) -> Result<Vec<u8>, CanonicalError> {
    serde_jcs::to_vec(value).map_err(|e| CanonicalError::Jcs(e.to_string()))
}
