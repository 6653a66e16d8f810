//! The rollback artifact data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warden_types::ActionType;

/// The minimum information required to reverse a specific action, with
/// construction rules per action type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum PriorState {
    /// `BLOCK_PROCESS`. Rollback is a no-op unless `restart_descriptor` is
    /// present, per Open Question 3 (see `DESIGN.md`).
    Process {
        image_path: String,
        parent_pid: u32,
        executable_hash: String,
        command_line: String,
        restart_descriptor: Option<String>,
    },
    /// `BLOCK_NETWORK_CONNECTION` / `TEMPORARY_FIREWALL_RULE`. Rollback
    /// removes the rule by exact-match handle.
    FirewallRule { rule_text: String, rule_handle: String },
    /// `QUARANTINE_FILE`. Rollback restores path and metadata from
    /// hash-addressed storage.
    QuarantinedFile {
        original_path: String,
        owner: String,
        mode: u32,
        xattrs: Vec<(String, String)>,
        content_hash: String,
    },
    /// `ISOLATE_HOST` / `NETWORK_SEGMENT_ISOLATION`.
    InterfaceState {
        interface: String,
        was_up: bool,
        addresses: Vec<String>,
        routes: Vec<String>,
    },
    /// `LOCK_USER`.
    UserAccount {
        account_enabled: bool,
        terminated_session_ids: Vec<String>,
    },
    /// `DISABLE_SERVICE`.
    ServiceState { was_enabled: bool, was_running: bool },
    /// `MASS_PROCESS_KILL`. Rollback is advisory unless every entry carries
    /// a restart descriptor, per Open Question 3.
    ProcessSet {
        processes: Vec<ProcessDescriptor>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessDescriptor {
    pub pid: u32,
    pub image_hash: String,
    pub parent_pid: u32,
    pub restart_descriptor: Option<String>,
}

/// `{ command_id, action_type, prior_state, capture_instant,
/// encryption_nonce }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RollbackArtifact {
    pub command_id: Uuid,
    pub action_type: ActionType,
    pub prior_state: PriorState,
    pub capture_instant: DateTime<Utc>,
    pub encryption_nonce: String,
}
