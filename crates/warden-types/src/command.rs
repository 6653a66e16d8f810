//! The frozen command shape and its action-specific target payloads.
//!
//! Parsing happens in two steps, mirroring the "decode, then validate" split
//! the admission pipeline's first gate performs: [`RawCommand`] is the
//! `deny_unknown_fields` wire shape with an untyped `target`; [`Command`] is
//! the validated, strongly-typed form produced once `target` has been
//! checked against `action_type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RejectionKind;

/// The nine-member closed action taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    BlockProcess,
    BlockNetworkConnection,
    TemporaryFirewallRule,
    QuarantineFile,
    IsolateHost,
    LockUser,
    DisableService,
    MassProcessKill,
    NetworkSegmentIsolation,
}

impl ActionType {
    pub fn is_destructive(self) -> bool {
        DESTRUCTIVE_ACTIONS.contains(&self)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::BlockProcess => "BLOCK_PROCESS",
            ActionType::BlockNetworkConnection => "BLOCK_NETWORK_CONNECTION",
            ActionType::TemporaryFirewallRule => "TEMPORARY_FIREWALL_RULE",
            ActionType::QuarantineFile => "QUARANTINE_FILE",
            ActionType::IsolateHost => "ISOLATE_HOST",
            ActionType::LockUser => "LOCK_USER",
            ActionType::DisableService => "DISABLE_SERVICE",
            ActionType::MassProcessKill => "MASS_PROCESS_KILL",
            ActionType::NetworkSegmentIsolation => "NETWORK_SEGMENT_ISOLATION",
        };
        write!(f, "{s}")
    }
}

/// The destructive subset of the action taxonomy.
pub const DESTRUCTIVE_ACTIONS: [ActionType; 5] = [
    ActionType::IsolateHost,
    ActionType::LockUser,
    ActionType::DisableService,
    ActionType::MassProcessKill,
    ActionType::NetworkSegmentIsolation,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreMode {
    DryRun,
    GuardedExec,
    FullEnforce,
}

/// The five-value issuer role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    SecurityAnalyst,
    PolicyManager,
    ItAdmin,
    Auditor,
}

/// Action-specific target identifier. All nine variants have disjoint
/// field sets, so the wire payload carries no discriminator of its own —
/// `serde` picks the matching variant from the fields present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Process {
        pid: u32,
        image_hash: String,
    },
    NetworkConnection {
        src_ip: String,
        src_port: u16,
        dst_ip: String,
        dst_port: u16,
        protocol: String,
    },
    FirewallRule {
        rule_text: String,
    },
    File {
        path: String,
    },
    Interface {
        interface: Option<String>,
    },
    User {
        user_id: String,
    },
    Service {
        service_name: String,
    },
    ProcessSet {
        pids: Vec<u32>,
    },
    Segment {
        cidr: String,
    },
}

impl Target {
    /// Validates that this target's shape matches what `action_type` requires,
    /// returning the shape mismatch as a shape rejection otherwise.
    pub fn matches_action(&self, action_type: ActionType) -> bool {
        matches!(
            (action_type, self),
            (ActionType::BlockProcess, Target::Process { .. })
                | (
                    ActionType::BlockNetworkConnection,
                    Target::NetworkConnection { .. }
                )
                | (
                    ActionType::TemporaryFirewallRule,
                    Target::FirewallRule { .. }
                )
                | (ActionType::QuarantineFile, Target::File { .. })
                | (ActionType::IsolateHost, Target::Interface { .. })
                | (ActionType::LockUser, Target::User { .. })
                | (ActionType::DisableService, Target::Service { .. })
                | (ActionType::MassProcessKill, Target::ProcessSet { .. })
                | (
                    ActionType::NetworkSegmentIsolation,
                    Target::Segment { .. }
                )
        )
    }
}

/// The wire shape: `deny_unknown_fields` rejects any field outside the
/// frozen contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCommand {
    pub command_id: Uuid,
    pub action_type: String,
    pub target: Value,
    pub incident_id: Uuid,
    pub tre_mode: String,
    pub issued_by_user_id: String,
    pub issued_by_role: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub rollback_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<String>,
    pub signature: String,
    pub signing_key_id: String,
    pub signing_algorithm: String,
    pub signed_at: chrono::DateTime<chrono::Utc>,
}

impl RawCommand {
    /// Parses a raw wire command from its canonical JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RejectionKind> {
        serde_json::from_slice(bytes)
            .map_err(|e| RejectionKind::Shape(format!("malformed command envelope: {e}")))
    }

    /// The signed byte payload: canonical JSON with the signing fields
    /// removed.
    pub fn signed_payload(&self) -> Result<Vec<u8>, RejectionKind> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| RejectionKind::Shape(format!("re-serialization failed: {e}")))?;
        if let Value::Object(ref mut map) = value {
            map.remove("signature");
            map.remove("signing_key_id");
            map.remove("signing_algorithm");
            map.remove("signed_at");
        }
        crate::canonical::canonical_bytes_value(&value)
            .map_err(|e| RejectionKind::Shape(format!("canonicalization failed: {e}")))
    }
}

/// A fully validated command: `action_type`, `tre_mode`, `issued_by_role` are
/// known enum members and `target`'s shape matches `action_type`.
#[derive(Debug, Clone)]
pub struct Command {
    pub command_id: Uuid,
    pub action_type: ActionType,
    pub target: Target,
    pub incident_id: Uuid,
    pub tre_mode: TreMode,
    pub issued_by_user_id: String,
    pub issued_by_role: Role,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub rollback_token: String,
    pub approval_id: Option<String>,
    pub signature: String,
    pub signing_key_id: String,
    pub signing_algorithm: String,
    pub signed_at: chrono::DateTime<chrono::Utc>,
    pub raw: RawCommand,
}

impl Command {
    /// Validates shape concerns not expressible in `serde`'s type system:
    /// enum membership for string-typed fields, and target/action agreement.
    /// This is the first gate of the admission pipeline.
    pub fn validate(raw: RawCommand) -> Result<Self, RejectionKind> {
        let action_type: ActionType = serde_json::from_value(Value::String(raw.action_type.clone()))
            .map_err(|_| RejectionKind::Shape(format!("unknown action_type: {}", raw.action_type)))?;
        let tre_mode: TreMode = serde_json::from_value(Value::String(raw.tre_mode.clone()))
            .map_err(|_| RejectionKind::Shape(format!("unknown tre_mode: {}", raw.tre_mode)))?;
        let issued_by_role: Role =
            serde_json::from_value(Value::String(raw.issued_by_role.clone()))
                .map_err(|_| {
                    RejectionKind::Shape(format!("unknown issued_by_role: {}", raw.issued_by_role))
                })?;
        let target: Target = serde_json::from_value(raw.target.clone())
            .map_err(|e| RejectionKind::Shape(format!("malformed target: {e}")))?;
        if !target.matches_action(action_type) {
            return Err(RejectionKind::Shape(format!(
                "target shape does not match action_type {action_type}"
            )));
        }

        Ok(Command {
            command_id: raw.command_id,
            action_type,
            target,
            incident_id: raw.incident_id,
            tre_mode,
            issued_by_user_id: raw.issued_by_user_id.clone(),
            issued_by_role,
            issued_at: raw.issued_at,
            expires_at: raw.expires_at,
            rollback_token: raw.rollback_token.clone(),
            approval_id: raw.approval_id.clone(),
            signature: raw.signature.clone(),
            signing_key_id: raw.signing_key_id.clone(),
            signing_algorithm: raw.signing_algorithm.clone(),
            signed_at: raw.signed_at,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawCommand {
        RawCommand {
            command_id: Uuid::new_v4(),
            action_type: "BLOCK_PROCESS".into(),
            target: serde_json::json!({"pid": 4242, "image_hash": "ab"}),
            incident_id: Uuid::new_v4(),
            tre_mode: "FULL_ENFORCE".into(),
            issued_by_user_id: "analyst-1".into(),
            issued_by_role: "SECURITY_ANALYST".into(),
            issued_at: chrono::Utc::now(),
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(5),
            rollback_token: "00".repeat(32),
            approval_id: None,
            signature: "deadbeef".into(),
            signing_key_id: "key-1".into(),
            signing_algorithm: "ed25519".into(),
            signed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut value = serde_json::to_value(sample_raw()).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("extra_field".into(), serde_json::json!(true));
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(RawCommand::from_slice(&bytes).is_err());
    }

    #[test]
    fn unknown_enum_value_is_rejected() {
        let mut raw = sample_raw();
        raw.action_type = "DELETE_DATABASE".into();
        assert!(Command::validate(raw).is_err());
    }

    #[test]
    fn mismatched_target_is_rejected() {
        let mut raw = sample_raw();
        raw.target = serde_json::json!({"service_name": "sshd"});
        assert!(Command::validate(raw).is_err());
    }

    #[test]
    fn valid_command_validates() {
        let raw = sample_raw();
        let cmd = Command::validate(raw).unwrap();
        assert_eq!(cmd.action_type, ActionType::BlockProcess);
        assert!(!cmd.action_type.is_destructive());
    }

    #[test]
    fn destructive_set_is_exact() {
        assert!(ActionType::IsolateHost.is_destructive());
        assert!(ActionType::LockUser.is_destructive());
        assert!(ActionType::DisableService.is_destructive());
        assert!(ActionType::MassProcessKill.is_destructive());
        assert!(ActionType::NetworkSegmentIsolation.is_destructive());
        assert!(!ActionType::BlockProcess.is_destructive());
    }

    #[test]
    fn signed_payload_excludes_signing_fields() {
        let raw = sample_raw();
        let payload = raw.signed_payload().unwrap();
        let text = String::from_utf8(payload).unwrap();
        assert!(!text.contains("signature"));
        assert!(!text.contains("signing_key_id"));
        assert!(!text.contains("signing_algorithm"));
        assert!(!text.contains("signed_at"));
    }
}
