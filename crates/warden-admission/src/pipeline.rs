//! Admission Pipeline: the ordered gate sequence. Any failure short-circuits
//! to rejection; no later gate runs.

use std::sync::Arc;
use uuid::Uuid;

use warden_audit::AuditLog;
use warden_crypto::Signature;
use warden_policy::{KeyDirectory, PolicyStore};
use warden_types::{Command, EventType, RawCommand, RejectionKind};

use crate::autonomous::{self, AutonomousDecision, ReachabilityProbe};
use crate::error::FatalError;
use crate::freshness::Freshness;
use crate::permission;

/// The result of running a command through every gate.
pub enum AdmissionOutcome {
    Accepted(Command),
    Rejected {
        command_id: Option<Uuid>,
        kind: RejectionKind,
    },
}

pub struct AdmissionPipeline {
    agent_id: Uuid,
    freshness: Freshness,
    keys: KeyDirectory,
    policy: Arc<PolicyStore>,
    audit: Arc<AuditLog>,
    reachability: Arc<dyn ReachabilityProbe>,
}

impl AdmissionPipeline {
    pub fn new(
        agent_id: Uuid,
        keys: KeyDirectory,
        policy: Arc<PolicyStore>,
        audit: Arc<AuditLog>,
        reachability: Arc<dyn ReachabilityProbe>,
    ) -> Self {
        Self {
            agent_id,
            freshness: Freshness::new(),
            keys,
            policy,
            audit,
            reachability,
        }
    }

    /// Runs gates 1-8 over one wire message, writing audit records as each
    /// gate boundary requires.
    pub async fn evaluate(&self, raw_bytes: &[u8]) -> Result<AdmissionOutcome, FatalError> {
        // Gate 1: shape (decode).
        let raw = match RawCommand::from_slice(raw_bytes) {
            Ok(raw) => raw,
            Err(kind) => {
                // The message never yielded a usable `command_id`; nothing
                // to record. Retrying a malformed message must not be
                // locked out.
                return Ok(AdmissionOutcome::Rejected {
                    command_id: None,
                    kind,
                });
            }
        };
        let command_id = raw.command_id;

        let command = match Command::validate(raw) {
            Ok(command) => command,
            Err(kind) => {
                self.reject(command_id, &kind)?;
                return Ok(AdmissionOutcome::Rejected {
                    command_id: Some(command_id),
                    kind,
                });
            }
        };

        // Gate 2a: replay precheck against both the nonce cache and the
        // persisted audit chain.
        if self.freshness.nonces.contains(command_id) || self.audit.contains_command_id(command_id)
        {
            self.reject(command_id, &RejectionKind::Replay)?;
            return Ok(AdmissionOutcome::Rejected {
                command_id: Some(command_id),
                kind: RejectionKind::Replay,
            });
        }

        // The command is novel: mark receipt in the chain before running
        // the remaining gates.
        self.receive(&command)?;

        let now = Freshness::now();

        // Gate 2b: freshness.
        if let Err(kind) = Freshness::check_temporal(command.issued_at, command.expires_at, now) {
            self.reject(command_id, &kind)?;
            return Ok(AdmissionOutcome::Rejected {
                command_id: Some(command_id),
                kind,
            });
        }

        // Gate 2c: rate limit.
        if let Err(kind) = self.freshness.rate_window.check_and_record(now) {
            self.reject(command_id, &kind)?;
            return Ok(AdmissionOutcome::Rejected {
                command_id: Some(command_id),
                kind,
            });
        }

        // Gate 3 + 4: signature and issuer identity. An unknown
        // `signing_key_id` short-circuits before the constant-time compare.
        let trusted_key = match self.keys.get(&command.signing_key_id) {
            Some(key) => key,
            None => {
                let kind = RejectionKind::UnknownIssuer;
                self.reject(command_id, &kind)?;
                return Ok(AdmissionOutcome::Rejected {
                    command_id: Some(command_id),
                    kind,
                });
            }
        };
        if trusted_key.attested_role != command.issued_by_role {
            let kind = RejectionKind::UnknownIssuer;
            self.reject(command_id, &kind)?;
            return Ok(AdmissionOutcome::Rejected {
                command_id: Some(command_id),
                kind,
            });
        }
        let signature_check = Signature::from_hex(&command.signature)
            .map_err(|_| RejectionKind::BadSignature)
            .and_then(|signature| {
                command
                    .raw
                    .signed_payload()
                    .map_err(|_| RejectionKind::BadSignature)
                    .map(|payload| (payload, signature))
            })
            .and_then(|(payload, signature)| {
                trusted_key
                    .public_key
                    .verify(&payload, &signature)
                    .map_err(|_| RejectionKind::BadSignature)
            });
        if let Err(kind) = signature_check {
            self.reject(command_id, &kind)?;
            return Ok(AdmissionOutcome::Rejected {
                command_id: Some(command_id),
                kind,
            });
        }

        // Gate 5: role authority.
        if !permission::role_permits(command.issued_by_role, command.action_type) {
            let kind = RejectionKind::Role;
            self.reject(command_id, &kind)?;
            return Ok(AdmissionOutcome::Rejected {
                command_id: Some(command_id),
                kind,
            });
        }

        // Gate 6: approval for destructive actions.
        if let Err(kind) = crate::approval::check_approval(&command, &self.keys) {
            self.reject(command_id, &kind)?;
            return Ok(AdmissionOutcome::Rejected {
                command_id: Some(command_id),
                kind,
            });
        }

        // Gate 7: idempotency, authoritative recheck against the persisted
        // chain right before acceptance is finalized.
        if self.audit.contains_command_id(command_id) {
            let kind = RejectionKind::Replay;
            self.reject(command_id, &kind)?;
            return Ok(AdmissionOutcome::Rejected {
                command_id: Some(command_id),
                kind,
            });
        }

        // Gate 8: policy authority.
        let reachable = self.reachability.check().await;
        if !reachable {
            let cached = self.policy.current_policy();
            let decision = autonomous::evaluate(cached.as_ref(), command.action_type);
            let reason = match &cached {
                Some(policy) => format!("cached_policy_version={}", policy.version),
                None => "cached_policy_version=absent".to_string(),
            };
            self.audit.append(
                EventType::AutonomousEnforce,
                self.agent_id,
                Some(command_id),
                Some(command.action_type),
                format!("AUTONOMOUS_ENFORCE:{}", decision.tag()),
                Some(reason),
            )?;
            if decision == AutonomousDecision::Deny {
                let kind = RejectionKind::Policy;
                self.reject(command_id, &kind)?;
                return Ok(AdmissionOutcome::Rejected {
                    command_id: Some(command_id),
                    kind,
                });
            }
        }

        self.freshness.nonces.insert(command_id, now);
        Ok(AdmissionOutcome::Accepted(command))
    }

    fn receive(&self, command: &Command) -> Result<(), FatalError> {
        self.audit.append(
            EventType::CommandReceived,
            self.agent_id,
            Some(command.command_id),
            Some(command.action_type),
            "RECEIVED",
            None,
        )?;
        Ok(())
    }

    fn reject(&self, command_id: Uuid, kind: &RejectionKind) -> Result<(), FatalError> {
        self.audit.append(
            EventType::CommandRejected,
            self.agent_id,
            Some(command_id),
            None,
            kind.outcome(),
            Some(kind.to_string()),
        )?;
        tracing::warn!(
            target: "warden_admission",
            command_id = %command_id,
            outcome = %kind.outcome(),
            "command rejected"
        );
        Ok(())
    }
}
