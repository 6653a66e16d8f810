use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("canonicalization error: {0}")]
    Canonical(#[from] warden_types::canonical::CanonicalError),
    /// The persisted hash chain does not link. This is fatal; the caller
    /// must terminate the process.
    #[error("audit chain broken at segment {segment}, sequence {sequence}: {detail}")]
    ChainBroken {
        segment: u64,
        sequence: u64,
        detail: String,
    },
}
