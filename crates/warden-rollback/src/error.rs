use thiserror::Error;

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("canonicalization error: {0}")]
    Canonical(#[from] warden_types::canonical::CanonicalError),
    #[error("crypto error: {0}")]
    Crypto(#[from] warden_crypto::CryptoError),
    #[error("artifact envelope is malformed: {0}")]
    Malformed(String),
    #[error("no rollback artifact found for command {0}")]
    NotFound(uuid::Uuid),
}
