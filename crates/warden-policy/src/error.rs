use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("canonicalization error: {0}")]
    Canonical(#[from] warden_types::canonical::CanonicalError),
    #[error("malformed key entry: {0}")]
    MalformedKey(String),
    #[error("malformed policy: {0}")]
    MalformedPolicy(String),
}
