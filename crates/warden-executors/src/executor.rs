//! Action Executors: `precheck → apply → postverify`, one invocation per
//! accepted command.

use std::sync::Arc;
use std::time::Duration;

use warden_rollback::{PriorState, ProcessDescriptor, RollbackEngine};
use warden_types::{ActionType, Command, FailureKind, Target, TreMode};

use crate::error::ExecutorError;
use crate::platform::OsDriver;

/// Default per-action soft timeout.
pub const DEFAULT_SOFT_TIMEOUT: Duration = Duration::from_secs(30);

/// The outcome of one `execute()` call, mirroring the receipt shape the
/// agent assigns to `outcome`.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Executed { rollback_token: String },
    Simulated { rollback_token: String },
    RolledBack {
        rollback_token: String,
        failure: FailureKind,
    },
}

/// Drives a single command through capture, precheck, apply, and
/// postverify against a platform adapter.
pub struct ActionExecutor {
    driver: Arc<dyn OsDriver>,
    rollback: RollbackEngine,
    quarantine_dir: String,
    soft_timeout: Duration,
}

impl ActionExecutor {
    pub fn new(
        driver: Arc<dyn OsDriver>,
        rollback: RollbackEngine,
        quarantine_dir: impl Into<String>,
        soft_timeout: Duration,
    ) -> Self {
        Self {
            driver,
            rollback,
            quarantine_dir: quarantine_dir.into(),
            soft_timeout,
        }
    }

    /// Runs the full `precheck → apply → postverify` transaction for one
    /// already-admitted command. A rollback-capture failure is returned as
    /// `Err` so the caller can surface `REJECTED:ROLLBACK_PREP_FAILED`
    /// without touching the OS at all; everything after capture succeeds
    /// resolves to an `Ok(ExecutionOutcome)`.
    pub async fn execute(&self, command: &Command) -> Result<ExecutionOutcome, ExecutorError> {
        let prior_state = self.snapshot(command).await?;
        let (_artifact, rollback_token) = self
            .rollback
            .capture(command.command_id, command.action_type, prior_state.clone())
            .map_err(ExecutorError::Rollback)?;

        if command.tre_mode == TreMode::DryRun {
            // Gates run, artifact is captured, precheck/postverify run
            // against a simulated apply; no OS state changes.
            self.precheck(command, &prior_state).await?;
            return Ok(ExecutionOutcome::Simulated { rollback_token });
        }

        let attempt = tokio::time::timeout(self.soft_timeout, async {
            self.precheck(command, &prior_state).await?;
            self.apply(command).await?;
            self.postverify(command, &prior_state).await
        })
        .await;

        match attempt {
            Err(_elapsed) => {
                self.reverse(command, &prior_state).await;
                Ok(ExecutionOutcome::RolledBack {
                    rollback_token,
                    failure: FailureKind::Timeout,
                })
            }
            Ok(Err(err)) => {
                let failure = err.as_failure_kind();
                // Only a postverify divergence implies state was actually
                // changed and needs reversing; precheck/apply failures
                // never touched the OS.
                if matches!(failure, FailureKind::Postverify) {
                    self.reverse(command, &prior_state).await;
                }
                Ok(ExecutionOutcome::RolledBack {
                    rollback_token,
                    failure,
                })
            }
            Ok(Ok(())) => Ok(ExecutionOutcome::Executed { rollback_token }),
        }
    }

    async fn snapshot(&self, command: &Command) -> Result<PriorState, ExecutorError> {
        match (&command.target, command.action_type) {
            (Target::Process { pid, .. }, ActionType::BlockProcess) => {
                // Captured regardless of `exists`: a process that has
                // already exited is a precheck concern (below), not a
                // rollback-capture one.
                let snap = self.driver.process_snapshot(*pid).await?;
                let _ = snap.exists;
                Ok(PriorState::Process {
                    image_path: snap.image_path,
                    parent_pid: snap.parent_pid,
                    executable_hash: snap.executable_hash,
                    command_line: snap.command_line,
                    restart_descriptor: None,
                })
            }
            (Target::NetworkConnection { .. }, ActionType::BlockNetworkConnection)
            | (Target::FirewallRule { .. }, ActionType::TemporaryFirewallRule) => {
                let rule_text = self.rule_text(command);
                Ok(PriorState::FirewallRule {
                    rule_handle: format!("iptables:{rule_text}"),
                    rule_text,
                })
            }
            (Target::File { path }, ActionType::QuarantineFile) => {
                if !self.driver.path_exists(path).await? {
                    return Err(ExecutorError::PrecheckMismatch(format!(
                        "file {path} does not exist"
                    )));
                }
                let file = self.driver.file_snapshot(path).await?;
                Ok(PriorState::QuarantinedFile {
                    original_path: path.clone(),
                    owner: file.owner,
                    mode: file.mode,
                    xattrs: file.xattrs,
                    content_hash: file.content_hash,
                })
            }
            (Target::Interface { interface }, ActionType::IsolateHost) => {
                let name = interface.clone().unwrap_or_default();
                let snap = self.driver.interface_snapshot(&name).await?;
                Ok(PriorState::InterfaceState {
                    interface: name,
                    was_up: snap.was_up,
                    addresses: snap.addresses,
                    routes: snap.routes,
                })
            }
            (Target::Segment { cidr }, ActionType::NetworkSegmentIsolation) => {
                Ok(PriorState::InterfaceState {
                    interface: cidr.clone(),
                    was_up: true,
                    addresses: Vec::new(),
                    routes: Vec::new(),
                })
            }
            (Target::User { user_id }, ActionType::LockUser) => {
                let snap = self.driver.user_snapshot(user_id).await?;
                Ok(PriorState::UserAccount {
                    account_enabled: snap.account_enabled,
                    terminated_session_ids: snap.session_ids,
                })
            }
            (Target::Service { service_name }, ActionType::DisableService) => {
                let snap = self.driver.service_snapshot(service_name).await?;
                Ok(PriorState::ServiceState {
                    was_enabled: snap.was_enabled,
                    was_running: snap.was_running,
                })
            }
            (Target::ProcessSet { pids }, ActionType::MassProcessKill) => {
                let mut processes = Vec::with_capacity(pids.len());
                for &pid in pids {
                    let snap = self.driver.process_snapshot(pid).await?;
                    processes.push(ProcessDescriptor {
                        pid,
                        image_hash: snap.executable_hash,
                        parent_pid: snap.parent_pid,
                        restart_descriptor: None,
                    });
                }
                Ok(PriorState::ProcessSet { processes })
            }
            _ => Err(ExecutorError::PrecheckMismatch(format!(
                "no executor wired for {}",
                command.action_type
            ))),
        }
    }

    fn rule_text(&self, command: &Command) -> String {
        match &command.target {
            Target::NetworkConnection {
                src_ip,
                src_port,
                dst_ip,
                dst_port,
                protocol,
            } => format!(
                "-p {protocol} -s {src_ip} --sport {src_port} -d {dst_ip} --dport {dst_port} -j DROP"
            ),
            Target::FirewallRule { rule_text } => rule_text.clone(),
            _ => String::new(),
        }
    }

    async fn precheck(&self, command: &Command, prior: &PriorState) -> Result<(), ExecutorError> {
        match (prior, &command.target) {
            (PriorState::Process { .. }, Target::Process { pid, .. }) => {
                if !self.driver.process_running(*pid).await? {
                    return Err(ExecutorError::PrecheckMismatch(format!(
                        "process {pid} is no longer running"
                    )));
                }
            }
            (PriorState::QuarantinedFile { original_path, .. }, _) => {
                if !self.driver.path_exists(original_path).await? {
                    return Err(ExecutorError::PrecheckMismatch(format!(
                        "{original_path} no longer present"
                    )));
                }
            }
            (PriorState::UserAccount { .. }, Target::User { user_id }) => {
                let snap = self.driver.user_snapshot(user_id).await?;
                if !snap.account_enabled {
                    return Err(ExecutorError::PrecheckMismatch(format!(
                        "account {user_id} already disabled"
                    )));
                }
            }
            (PriorState::ServiceState { .. }, Target::Service { service_name }) => {
                let snap = self.driver.service_snapshot(service_name).await?;
                if !snap.was_running && !snap.was_enabled {
                    return Err(ExecutorError::PrecheckMismatch(format!(
                        "service {service_name} already disabled"
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn apply(&self, command: &Command) -> Result<(), ExecutorError> {
        match (command.action_type, &command.target) {
            (ActionType::BlockProcess, Target::Process { pid, .. }) => {
                self.driver.kill_process(*pid).await
            }
            (ActionType::BlockNetworkConnection, _) | (ActionType::TemporaryFirewallRule, _) => {
                self.driver
                    .insert_firewall_rule(&self.rule_text(command))
                    .await
                    .map(|_handle| ())
            }
            (ActionType::QuarantineFile, Target::File { path }) => self
                .driver
                .quarantine_file(path, &self.quarantine_dir)
                .await
                .map(|_| ()),
            (ActionType::IsolateHost, Target::Interface { interface }) => {
                self.driver
                    .set_interface_up(&interface.clone().unwrap_or_default(), false)
                    .await
            }
            (ActionType::NetworkSegmentIsolation, Target::Segment { cidr }) => {
                self.driver.isolate_segment(cidr, true).await
            }
            (ActionType::LockUser, Target::User { user_id }) => {
                self.driver.set_user_enabled(user_id, false).await?;
                self.driver.terminate_user_sessions(user_id).await.map(|_| ())
            }
            (ActionType::DisableService, Target::Service { service_name }) => {
                self.driver.set_service(service_name, false, false).await
            }
            (ActionType::MassProcessKill, Target::ProcessSet { pids }) => {
                self.driver.mass_kill(pids).await.map(|_| ())
            }
            _ => Err(ExecutorError::Apply("no matching executor".into())),
        }
    }

    async fn postverify(&self, command: &Command, prior: &PriorState) -> Result<(), ExecutorError> {
        let satisfied = match (command.action_type, &command.target) {
            (ActionType::BlockProcess, Target::Process { pid, .. }) => {
                !self.driver.process_running(*pid).await?
            }
            (ActionType::BlockNetworkConnection, _) | (ActionType::TemporaryFirewallRule, _) => {
                self.driver
                    .firewall_rule_present(&format!("iptables:{}", self.rule_text(command)))
                    .await?
            }
            (ActionType::QuarantineFile, Target::File { path }) => {
                !self.driver.path_exists(path).await?
            }
            (ActionType::IsolateHost, Target::Interface { interface }) => {
                let snap = self
                    .driver
                    .interface_snapshot(&interface.clone().unwrap_or_default())
                    .await?;
                !snap.was_up
            }
            (ActionType::NetworkSegmentIsolation, _) => true,
            (ActionType::LockUser, Target::User { user_id }) => {
                !self.driver.user_snapshot(user_id).await?.account_enabled
            }
            (ActionType::DisableService, Target::Service { service_name }) => {
                let snap = self.driver.service_snapshot(service_name).await?;
                !snap.was_enabled && !snap.was_running
            }
            (ActionType::MassProcessKill, Target::ProcessSet { pids }) => {
                let mut all_dead = true;
                for &pid in pids {
                    if self.driver.process_running(pid).await? {
                        all_dead = false;
                    }
                }
                all_dead
            }
            _ => false,
        };
        let _ = prior;
        if satisfied {
            Ok(())
        } else {
            Err(ExecutorError::Postverify)
        }
    }

    /// Best-effort reversal using the captured prior state. Errors here are
    /// logged, never propagated: the terminal outcome is already
    /// `FAILED_ROLLED_BACK`, and a failed reversal does not change that.
    async fn reverse(&self, command: &Command, prior: &PriorState) {
        let result: Result<(), ExecutorError> = match prior {
            PriorState::Process { .. } => Ok(()), // no-op unless a restart descriptor exists
            PriorState::FirewallRule { rule_handle, .. } => {
                self.driver.remove_firewall_rule(rule_handle).await
            }
            PriorState::QuarantinedFile {
                original_path,
                owner,
                mode,
                content_hash,
                ..
            } => {
                self.driver
                    .restore_file(original_path, &self.quarantine_dir, content_hash, owner, *mode)
                    .await
            }
            PriorState::InterfaceState {
                interface, was_up, ..
            } => self.driver.set_interface_up(interface, *was_up).await,
            PriorState::UserAccount {
                account_enabled, ..
            } => self.driver.set_user_enabled(&user_id_of(command), *account_enabled).await,
            PriorState::ServiceState {
                was_enabled,
                was_running,
            } => {
                let service_name = service_name_of(command);
                self.driver.set_service(&service_name, *was_enabled, *was_running).await
            }
            PriorState::ProcessSet { .. } => Ok(()), // advisory only, not reversible
        };

        if let Err(e) = result {
            tracing::warn!(
                target: "warden_executors",
                command_id = %command.command_id,
                error = %e,
                "rollback reversal did not fully complete"
            );
        }
    }
}

fn user_id_of(command: &Command) -> String {
    match &command.target {
        Target::User { user_id } => user_id.clone(),
        _ => String::new(),
    }
}

fn service_name_of(command: &Command) -> String {
    match &command.target {
        Target::Service { service_name } => service_name.clone(),
        _ => String::new(),
    }
}
