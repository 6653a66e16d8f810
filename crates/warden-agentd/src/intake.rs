//! Bounded command intake: a small channel in front of the supervisor.
//! Overflow rejects with `RATE_LIMITED` rather than queueing; there is no
//! internal backlog beyond the channel's capacity.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use warden_admission::FatalError;
use warden_audit::AuditLog;
use warden_types::{EventType, ExecutionReceipt, Outcome, RejectionKind};

use crate::supervisor::Supervisor;

struct Request {
    raw_bytes: Vec<u8>,
    reply: oneshot::Sender<Result<ExecutionReceipt, FatalError>>,
}

/// A cheaply cloneable submission handle. Multiple callers may submit
/// concurrently; the backing worker task processes them one at a time
/// through `Supervisor::handle_command`.
#[derive(Clone)]
pub struct Intake {
    sender: mpsc::Sender<Request>,
    audit: Arc<AuditLog>,
    agent_id: Uuid,
}

impl Intake {
    /// Submits one raw wire command, waiting for its terminal receipt.
    /// Returns `Err(FatalError)` only for the one non-recoverable
    /// condition, an audit write failure; callers in that case must stop
    /// the process.
    pub async fn submit(&self, raw_bytes: Vec<u8>) -> Result<ExecutionReceipt, FatalError> {
        let (reply, rx) = oneshot::channel();
        let overflowed = self
            .sender
            .try_send(Request {
                raw_bytes: raw_bytes.clone(),
                reply,
            })
            .is_err();
        if overflowed {
            return self.reject_rate_limited(&raw_bytes);
        }
        // The worker task never drops a request without replying; a
        // closed oneshot can only mean the worker stopped after a fatal
        // audit error, which this call itself then surfaces.
        match rx.await {
            Ok(result) => result,
            Err(_) => self.reject_rate_limited(&raw_bytes),
        }
    }

    /// No rejection is silent: an intake-overflow rejection gets the same
    /// `COMMAND_REJECTED` audit record every gate rejection gets.
    fn reject_rate_limited(&self, raw_bytes: &[u8]) -> Result<ExecutionReceipt, FatalError> {
        let command_id = extract_command_id(raw_bytes);
        let kind = RejectionKind::RateLimited;
        let record = self.audit.append(
            EventType::CommandRejected,
            self.agent_id,
            command_id,
            None,
            kind.outcome(),
            Some(kind.to_string()),
        )?;
        tracing::warn!(
            target: "warden_agentd",
            command_id = ?command_id,
            "intake channel at capacity, command rejected without admission"
        );
        Ok(ExecutionReceipt {
            command_id: command_id.unwrap_or_else(Uuid::nil),
            outcome: Outcome::Rejected(kind.tag().to_string()),
            rollback_token: None,
            audit_sequence: record.sequence,
        })
    }
}

/// Best-effort extraction of `command_id` from an otherwise-unparsed wire
/// message, purely so an intake-overflow rejection can still be traced
/// back to the command that triggered it.
fn extract_command_id(raw_bytes: &[u8]) -> Option<Uuid> {
    let value: serde_json::Value = serde_json::from_slice(raw_bytes).ok()?;
    let id = value.get("command_id")?.as_str()?;
    Uuid::parse_str(id).ok()
}

/// Spawns the single-consumer worker loop and returns a handle to submit
/// work plus its join handle (awaited during graceful shutdown).
pub fn spawn(supervisor: Arc<Supervisor>, capacity: usize) -> (Intake, tokio::task::JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel(capacity);
    let agent_id = supervisor.agent_id();
    let audit = supervisor.audit();

    let worker = tokio::spawn(async move {
        while let Some(Request { raw_bytes, reply }) = receiver.recv().await {
            let result = supervisor.handle_command(&raw_bytes).await;
            let fatal = result.is_err();
            if let Err(ref e) = result {
                tracing::error!(target: "warden_agentd", error = %e, "fatal audit error, stopping intake");
            }
            let _ = reply.send(result);
            if fatal {
                break;
            }
        }
    });

    (
        Intake {
            sender,
            audit,
            agent_id,
        },
        worker,
    )
}
