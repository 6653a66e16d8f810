use warden_types::FailureKind;

/// A platform-adapter failure, always surfaced to the executor as one of
/// the `FAILED_ROLLED_BACK:<reason>` outcomes.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("target not found or no longer matches the captured prior state: {0}")]
    PrecheckMismatch(String),
    #[error("apply failed: {0}")]
    Apply(String),
    #[error("postverify did not observe the intended effect")]
    Postverify,
    #[error("executor exceeded its soft timeout")]
    Timeout,
    #[error("rollback artifact engine error: {0}")]
    Rollback(#[from] warden_rollback::RollbackError),
    #[error("audit log error: {0}")]
    Audit(#[from] warden_audit::AuditError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    /// Maps a platform/adapter-level error onto the closed failure taxonomy
    /// an executor reports in the audit log.
    pub fn as_failure_kind(&self) -> FailureKind {
        match self {
            ExecutorError::PrecheckMismatch(detail) => {
                FailureKind::PrecheckMismatch(detail.clone())
            }
            ExecutorError::Postverify => FailureKind::Postverify,
            ExecutorError::Timeout => FailureKind::Timeout,
            ExecutorError::Apply(detail) => FailureKind::ApplyError(detail.clone()),
            ExecutorError::Rollback(e) => FailureKind::ApplyError(e.to_string()),
            ExecutorError::Audit(e) => FailureKind::ApplyError(e.to_string()),
            ExecutorError::Io(e) => FailureKind::ApplyError(e.to_string()),
        }
    }
}
