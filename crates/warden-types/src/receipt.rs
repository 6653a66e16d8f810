//! Execution receipt returned to the issuing controller.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal outcome reported back to the controller. Carries the same
/// outcome string written to the audit log: there are no silent rejections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    Simulated,
    FailedRolledBack(String),
    Rejected(String),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Executed => write!(f, "EXECUTED"),
            Outcome::Simulated => write!(f, "SIMULATED"),
            Outcome::FailedRolledBack(tag) => write!(f, "FAILED_ROLLED_BACK:{tag}"),
            Outcome::Rejected(tag) => write!(f, "REJECTED:{tag}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub command_id: Uuid,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_token: Option<String>,
    pub audit_sequence: u64,
}
