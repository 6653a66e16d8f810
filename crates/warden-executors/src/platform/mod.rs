//! The platform adapter seam: `apply` performs the OS-level change.
//! [`OsDriver`] is the single trait every action executor calls through;
//! concrete adapters live in sibling modules (`unix`).

pub mod unix;

use async_trait::async_trait;

use crate::error::ExecutorError;

#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub exists: bool,
    pub image_path: String,
    pub parent_pid: u32,
    pub executable_hash: String,
    pub command_line: String,
}

#[derive(Debug, Clone)]
pub struct InterfaceSnapshot {
    pub was_up: bool,
    pub addresses: Vec<String>,
    pub routes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub account_enabled: bool,
    pub session_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceSnapshot {
    pub was_enabled: bool,
    pub was_running: bool,
}

#[derive(Debug, Clone)]
pub struct QuarantinedFile {
    pub owner: String,
    pub mode: u32,
    pub xattrs: Vec<(String, String)>,
    pub content_hash: String,
}

/// One descriptor of a process targeted by a `MASS_PROCESS_KILL` batch.
#[derive(Debug, Clone)]
pub struct KilledProcess {
    pub pid: u32,
    pub image_hash: String,
    pub parent_pid: u32,
}

/// Everything an executor needs from the operating system, abstracted so
/// the enforcement logic in `executor.rs` is platform-independent and
/// testable against a fake.
#[async_trait]
pub trait OsDriver: Send + Sync {
    async fn process_snapshot(&self, pid: u32) -> Result<ProcessSnapshot, ExecutorError>;
    async fn kill_process(&self, pid: u32) -> Result<(), ExecutorError>;
    async fn process_running(&self, pid: u32) -> Result<bool, ExecutorError>;

    async fn insert_firewall_rule(&self, rule_text: &str) -> Result<String, ExecutorError>;
    async fn remove_firewall_rule(&self, handle: &str) -> Result<(), ExecutorError>;
    async fn firewall_rule_present(&self, handle: &str) -> Result<bool, ExecutorError>;

    async fn path_exists(&self, path: &str) -> Result<bool, ExecutorError>;
    /// Reads the file's current owner, mode, xattrs, and content hash
    /// without moving it. Used to capture the rollback snapshot before
    /// `quarantine_file` is ever permitted to run.
    async fn file_snapshot(&self, path: &str) -> Result<QuarantinedFile, ExecutorError>;
    async fn quarantine_file(
        &self,
        original_path: &str,
        quarantine_dir: &str,
    ) -> Result<QuarantinedFile, ExecutorError>;
    async fn restore_file(
        &self,
        original_path: &str,
        quarantine_dir: &str,
        content_hash: &str,
        owner: &str,
        mode: u32,
    ) -> Result<(), ExecutorError>;

    async fn interface_snapshot(&self, interface: &str) -> Result<InterfaceSnapshot, ExecutorError>;
    async fn set_interface_up(&self, interface: &str, up: bool) -> Result<(), ExecutorError>;

    async fn user_snapshot(&self, user_id: &str) -> Result<UserSnapshot, ExecutorError>;
    async fn set_user_enabled(&self, user_id: &str, enabled: bool) -> Result<(), ExecutorError>;
    async fn terminate_user_sessions(&self, user_id: &str) -> Result<Vec<String>, ExecutorError>;

    async fn service_snapshot(&self, service_name: &str) -> Result<ServiceSnapshot, ExecutorError>;
    async fn set_service(
        &self,
        service_name: &str,
        enabled: bool,
        running: bool,
    ) -> Result<(), ExecutorError>;

    async fn isolate_segment(&self, cidr: &str, isolate: bool) -> Result<(), ExecutorError>;

    async fn mass_kill(&self, pids: &[u32]) -> Result<Vec<KilledProcess>, ExecutorError>;
}
