use thiserror::Error;

/// An admission-time failure from which the process cannot recover. An
/// audit write failure is the single non-recoverable condition and
/// terminates the process.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("audit log write failed: {0}")]
    Audit(#[from] warden_audit::AuditError),
}
