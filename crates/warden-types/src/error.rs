//! The closed rejection/failure taxonomy, so every gate in the admission
//! pipeline and every executor surfaces the same strings rather than
//! formatting ad hoc text at each call site.

use thiserror::Error;

/// Why a command never reached execution. `Display` produces the exact
/// `REJECTED:<kind>` strings recorded in the audit log and receipts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionKind {
    #[error("SHAPE: {0}")]
    Shape(String),
    #[error("EXPIRED")]
    Expired,
    #[error("SKEWED")]
    Skewed,
    #[error("REPLAY")]
    Replay,
    #[error("RATE_LIMITED")]
    RateLimited,
    #[error("BAD_SIGNATURE")]
    BadSignature,
    #[error("UNKNOWN_ISSUER")]
    UnknownIssuer,
    #[error("ROLE")]
    Role,
    #[error("APPROVAL_MISSING")]
    ApprovalMissing,
    #[error("POLICY")]
    Policy,
    #[error("ROLLBACK_PREP_FAILED: {0}")]
    RollbackPrepFailed(String),
}

impl RejectionKind {
    /// The stable outcome string recorded in audit records and receipts,
    /// e.g. `REJECTED:BAD_SIGNATURE`.
    pub fn outcome(&self) -> String {
        format!("REJECTED:{}", self.tag())
    }

    pub fn tag(&self) -> &'static str {
        match self {
            RejectionKind::Shape(_) => "SHAPE",
            RejectionKind::Expired => "EXPIRED",
            RejectionKind::Skewed => "SKEWED",
            RejectionKind::Replay => "REPLAY",
            RejectionKind::RateLimited => "RATE_LIMITED",
            RejectionKind::BadSignature => "BAD_SIGNATURE",
            RejectionKind::UnknownIssuer => "UNKNOWN_ISSUER",
            RejectionKind::Role => "ROLE",
            RejectionKind::ApprovalMissing => "APPROVAL_MISSING",
            RejectionKind::Policy => "POLICY",
            RejectionKind::RollbackPrepFailed(_) => "ROLLBACK_PREP_FAILED",
        }
    }
}

/// Why an admitted command's execution did not complete cleanly. These
/// always resolve to an automatic rollback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error("PRECHECK_MISMATCH: {0}")]
    PrecheckMismatch(String),
    #[error("APPLY_ERROR: {0}")]
    ApplyError(String),
    #[error("POSTVERIFY")]
    Postverify,
    #[error("TIMEOUT")]
    Timeout,
}

impl FailureKind {
    pub fn outcome(&self) -> String {
        format!("FAILED_ROLLED_BACK:{}", self.tag())
    }

    pub fn tag(&self) -> &'static str {
        match self {
            FailureKind::PrecheckMismatch(_) => "PRECHECK_MISMATCH",
            FailureKind::ApplyError(_) => "APPLY_ERROR",
            FailureKind::Postverify => "POSTVERIFY",
            FailureKind::Timeout => "TIMEOUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_outcome_strings() {
        assert_eq!(RejectionKind::BadSignature.outcome(), "REJECTED:BAD_SIGNATURE");
        assert_eq!(RejectionKind::Replay.outcome(), "REJECTED:REPLAY");
    }

    #[test]
    fn failure_outcome_strings() {
        assert_eq!(FailureKind::Postverify.outcome(), "FAILED_ROLLED_BACK:POSTVERIFY");
        assert_eq!(FailureKind::Timeout.outcome(), "FAILED_ROLLED_BACK:TIMEOUT");
    }
}
