//! Local audit log record shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::ActionType;

/// Audit event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    CommandReceived,
    CommandRejected,
    CommandExecuted,
    CommandFailed,
    RollbackCreated,
    RollbackExecuted,
    AutonomousEnforce,
    PolicyRejected,
}

/// A single append-only audit record. `prior_hash`/`hash` form the tamper
/// evident chain: `hash = H(prior_hash || canonical(record - hash))`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_type: EventType,
    pub agent_id: Uuid,
    pub command_id: Option<Uuid>,
    pub action_type: Option<ActionType>,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub instant: chrono::DateTime<chrono::Utc>,
    pub sequence: u64,
    pub prior_hash: String,
    /// Present once the record has been finalized; absent while the hash is
    /// being computed over the rest of the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Genesis prior-hash value for a fresh chain: the first record in the
/// chain has a null prior hash, represented as 32 zero bytes, hex encoded.
pub fn genesis_hash() -> String {
    "0".repeat(64)
}
