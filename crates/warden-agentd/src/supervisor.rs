//! Supervisor: process lifecycle, admission, and the one-shot execution of
//! every accepted command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use warden_admission::{AdmissionOutcome, AdmissionPipeline, FatalError, HttpReachabilityProbe};
use warden_audit::AuditLog;
use warden_config::Config;
use warden_executors::{ActionExecutor, ExecutionOutcome, OsDriver, UnixOsDriver};
use warden_policy::{KeyDirectory, PolicyStore};
use warden_rollback::{ArtifactKey, RollbackEngine};
use warden_types::{Command, EventType, ExecutionReceipt, Outcome, RejectionKind};

use crate::error::StartupError;

fn ensure_dir(path: &std::path::Path) -> Result<(), StartupError> {
    std::fs::create_dir_all(path).map_err(|source| StartupError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Owns every long-lived resource the core needs: the trusted key
/// directory, the cached policy, the audit chain, and the action
/// executor. One `handle_command` call carries a raw wire command all the
/// way from admission through terminal audit record.
pub struct Supervisor {
    agent_id: Uuid,
    pipeline: AdmissionPipeline,
    executor: ActionExecutor,
    audit: Arc<AuditLog>,
    /// Serializes admission + one-shot execution end to end: concurrent
    /// intake is permitted but admission is serialized through a single
    /// nonce+rate gate.
    serialize: tokio::sync::Mutex<()>,
    accepting: AtomicBool,
}

impl Supervisor {
    /// Startup: load keys, load cached policy with integrity check, open
    /// the audit chain, provision the rollback artifact key.
    pub async fn startup(config: &Config) -> Result<Self, StartupError> {
        ensure_dir(&config.audit.directory)?;
        ensure_dir(&config.rollback.directory)?;
        ensure_dir(&config.quarantine_dir)?;

        let agent_id = Uuid::new_v4();

        let keys = KeyDirectory::load(
            &config.keys.bundle_dir,
            config.keys.operator_dir.as_deref(),
        )?;
        let policy = Arc::new(PolicyStore::load(&config.policy.cached_policy_path));
        let audit = Arc::new(AuditLog::open(
            &config.audit.directory,
            config.audit.max_segment_bytes,
        )?);

        let passphrase = config.resolve_artifact_key_passphrase()?;
        let artifact_key = if config.rollback.artifact_key_path.exists() {
            ArtifactKey::unlock(&config.rollback.artifact_key_path, &passphrase)?
        } else {
            let key = ArtifactKey::generate();
            key.seal(&config.rollback.artifact_key_path, &passphrase)?;
            key
        };
        let rollback = RollbackEngine::new(&config.rollback.directory, artifact_key)?;

        let reachability = Arc::new(HttpReachabilityProbe::new(
            config.controller.health_check_url.clone(),
        ));
        let pipeline = AdmissionPipeline::new(
            agent_id,
            keys,
            Arc::clone(&policy),
            Arc::clone(&audit),
            reachability,
        );

        let driver: Arc<dyn OsDriver> = Arc::new(UnixOsDriver::new());
        let executor = ActionExecutor::new(
            driver,
            rollback,
            config.quarantine_dir.to_string_lossy().into_owned(),
            config.soft_timeout(),
        );

        tracing::info!(target: "warden_agentd", %agent_id, "startup complete");

        Ok(Self {
            agent_id,
            pipeline,
            executor,
            audit,
            serialize: tokio::sync::Mutex::new(()),
            accepting: AtomicBool::new(true),
        })
    }

    /// Assembles a supervisor from already-built parts, bypassing
    /// `startup`'s own directory/key/policy provisioning. Exists so
    /// integration tests can swap in a fake `OsDriver` or reachability
    /// probe; production code always goes through `startup`.
    pub fn from_parts(
        agent_id: Uuid,
        pipeline: AdmissionPipeline,
        executor: ActionExecutor,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            agent_id,
            pipeline,
            executor,
            audit,
            serialize: tokio::sync::Mutex::new(()),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    pub fn audit(&self) -> Arc<AuditLog> {
        Arc::clone(&self.audit)
    }

    /// Stops accepting new admissions; in-flight calls already past this
    /// check still run to completion. No new admissions are accepted after
    /// the shutdown signal.
    pub fn begin_shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        tracing::info!(target: "warden_agentd", "shutdown signal received, draining in-flight work");
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Runs one raw wire command through admission and, if accepted,
    /// through execution, producing the receipt sent back to the
    /// controller.
    pub async fn handle_command(&self, raw_bytes: &[u8]) -> Result<ExecutionReceipt, FatalError> {
        let _serialized = self.serialize.lock().await;
        match self.pipeline.evaluate(raw_bytes).await? {
            AdmissionOutcome::Rejected { command_id, kind } => {
                let audit_sequence = self.audit.next_sequence().saturating_sub(1);
                Ok(ExecutionReceipt {
                    command_id: command_id.unwrap_or_else(Uuid::nil),
                    outcome: Outcome::Rejected(kind.tag().to_string()),
                    rollback_token: None,
                    audit_sequence,
                })
            }
            AdmissionOutcome::Accepted(command) => self.execute_accepted(command).await,
        }
    }

    async fn execute_accepted(&self, command: Command) -> Result<ExecutionReceipt, FatalError> {
        let command_id = command.command_id;
        let action_type = command.action_type;

        match self.executor.execute(&command).await {
            // Capture/snapshot failed before any OS state changed: the
            // command never ran, terminated as REJECTED:ROLLBACK_PREP_FAILED
            // with no side effects.
            Err(exec_err) => {
                let kind = RejectionKind::RollbackPrepFailed(exec_err.to_string());
                let record = self.audit.append(
                    EventType::CommandRejected,
                    self.agent_id,
                    Some(command_id),
                    Some(action_type),
                    kind.outcome(),
                    Some(kind.to_string()),
                )?;
                tracing::error!(
                    target: "warden_agentd",
                    %command_id,
                    error = %exec_err,
                    "rollback preparation failed, command rejected"
                );
                Ok(ExecutionReceipt {
                    command_id,
                    outcome: Outcome::Rejected(kind.tag().to_string()),
                    rollback_token: None,
                    audit_sequence: record.sequence,
                })
            }
            Ok(ExecutionOutcome::Simulated { rollback_token }) => {
                self.audit.append(
                    EventType::RollbackCreated,
                    self.agent_id,
                    Some(command_id),
                    Some(action_type),
                    "CREATED",
                    None,
                )?;
                let record = self.audit.append(
                    EventType::CommandExecuted,
                    self.agent_id,
                    Some(command_id),
                    Some(action_type),
                    "SIMULATED",
                    None,
                )?;
                Ok(ExecutionReceipt {
                    command_id,
                    outcome: Outcome::Simulated,
                    rollback_token: Some(rollback_token),
                    audit_sequence: record.sequence,
                })
            }
            Ok(ExecutionOutcome::Executed { rollback_token }) => {
                self.audit.append(
                    EventType::RollbackCreated,
                    self.agent_id,
                    Some(command_id),
                    Some(action_type),
                    "CREATED",
                    None,
                )?;
                let record = self.audit.append(
                    EventType::CommandExecuted,
                    self.agent_id,
                    Some(command_id),
                    Some(action_type),
                    "EXECUTED",
                    None,
                )?;
                Ok(ExecutionReceipt {
                    command_id,
                    outcome: Outcome::Executed,
                    rollback_token: Some(rollback_token),
                    audit_sequence: record.sequence,
                })
            }
            Ok(ExecutionOutcome::RolledBack {
                rollback_token,
                failure,
            }) => {
                self.audit.append(
                    EventType::RollbackCreated,
                    self.agent_id,
                    Some(command_id),
                    Some(action_type),
                    "CREATED",
                    None,
                )?;
                self.audit.append(
                    EventType::RollbackExecuted,
                    self.agent_id,
                    Some(command_id),
                    Some(action_type),
                    "EXECUTED",
                    Some(failure.to_string()),
                )?;
                let record = self.audit.append(
                    EventType::CommandFailed,
                    self.agent_id,
                    Some(command_id),
                    Some(action_type),
                    failure.outcome(),
                    Some(failure.to_string()),
                )?;
                Ok(ExecutionReceipt {
                    command_id,
                    outcome: Outcome::FailedRolledBack(failure.tag().to_string()),
                    rollback_token: Some(rollback_token),
                    audit_sequence: record.sequence,
                })
            }
        }
    }
}
