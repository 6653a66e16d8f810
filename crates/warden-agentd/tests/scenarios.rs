//! End-to-end scenarios driven through `Supervisor::handle_command`, the
//! same call path `main.rs` uses per inbound line.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use warden_admission::{AdmissionPipeline, AutonomousDecision, ReachabilityProbe};
use warden_audit::AuditLog;
use warden_crypto::SecretKey;
use warden_executors::platform::{
    InterfaceSnapshot, KilledProcess, ProcessSnapshot, QuarantinedFile, ServiceSnapshot,
    UserSnapshot,
};
use warden_executors::{ActionExecutor, ExecutorError, OsDriver};
use warden_policy::{KeyDirectory, PolicyStore, TrustedKey};
use warden_rollback::{ArtifactKey, RollbackEngine};
use warden_types::{Outcome, RawCommand, Role};

/// A driver that only knows how to answer for `BLOCK_PROCESS`; every
/// scenario here stays inside that one action type so the fake can be
/// small and still exercise the full admission-to-execution path.
#[derive(Default)]
struct FakeOsDriver {
    running: Mutex<HashSet<u32>>,
    /// Adds a small delay before answering `process_snapshot`, so a test
    /// can keep the executor busy long enough to observe a bounded
    /// channel actually fill up.
    slow: bool,
}

impl FakeOsDriver {
    fn with_process(pid: u32) -> Self {
        let mut running = HashSet::new();
        running.insert(pid);
        Self {
            running: Mutex::new(running),
            slow: false,
        }
    }

    fn with_process_slow(pid: u32) -> Self {
        let mut driver = Self::with_process(pid);
        driver.slow = true;
        driver
    }
}

#[async_trait]
impl OsDriver for FakeOsDriver {
    async fn process_snapshot(&self, pid: u32) -> Result<ProcessSnapshot, ExecutorError> {
        if self.slow {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(ProcessSnapshot {
            exists: self.running.lock().expect("lock").contains(&pid),
            image_path: "/usr/bin/malware".into(),
            parent_pid: 1,
            executable_hash: "ab".repeat(32),
            command_line: "malware --encrypt".into(),
        })
    }

    async fn kill_process(&self, pid: u32) -> Result<(), ExecutorError> {
        self.running.lock().expect("lock").remove(&pid);
        Ok(())
    }

    async fn process_running(&self, pid: u32) -> Result<bool, ExecutorError> {
        Ok(self.running.lock().expect("lock").contains(&pid))
    }

    async fn insert_firewall_rule(&self, _rule_text: &str) -> Result<String, ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn remove_firewall_rule(&self, _handle: &str) -> Result<(), ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn firewall_rule_present(&self, _handle: &str) -> Result<bool, ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn path_exists(&self, _path: &str) -> Result<bool, ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn quarantine_file(
        &self,
        _original_path: &str,
        _quarantine_dir: &str,
    ) -> Result<QuarantinedFile, ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn restore_file(
        &self,
        _original_path: &str,
        _quarantine_dir: &str,
        _content_hash: &str,
        _owner: &str,
        _mode: u32,
    ) -> Result<(), ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn interface_snapshot(&self, _interface: &str) -> Result<InterfaceSnapshot, ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn set_interface_up(&self, _interface: &str, _up: bool) -> Result<(), ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn user_snapshot(&self, _user_id: &str) -> Result<UserSnapshot, ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn set_user_enabled(&self, _user_id: &str, _enabled: bool) -> Result<(), ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn terminate_user_sessions(&self, _user_id: &str) -> Result<Vec<String>, ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn service_snapshot(&self, _service_name: &str) -> Result<ServiceSnapshot, ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn set_service(
        &self,
        _service_name: &str,
        _enabled: bool,
        _running: bool,
    ) -> Result<(), ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn isolate_segment(&self, _cidr: &str, _isolate: bool) -> Result<(), ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn mass_kill(&self, _pids: &[u32]) -> Result<Vec<KilledProcess>, ExecutorError> {
        unimplemented!("not exercised by these scenarios")
    }
}

/// A reachability probe whose answer the test controls directly, so the
/// policy-authority gate (8) can be exercised for both the reachable and
/// the autonomous-enforcement branches without a real controller.
struct FixedReachability(bool);

#[async_trait]
impl ReachabilityProbe for FixedReachability {
    async fn check(&self) -> bool {
        self.0
    }
}

struct Harness {
    supervisor: warden_agentd::Supervisor,
    issuer: SecretKey,
    _dirs: tempfile::TempDir,
}

fn build_harness(reachable: bool, pid: u32) -> Harness {
    build_harness_with_driver(reachable, Arc::new(FakeOsDriver::with_process(pid)))
}

fn build_harness_with_driver(reachable: bool, driver: Arc<dyn OsDriver>) -> Harness {
    let dirs = tempfile::tempdir().expect("tempdir");
    let agent_id = Uuid::new_v4();

    let issuer = SecretKey::generate();
    let mut keys = KeyDirectory::empty();
    keys.insert(TrustedKey {
        key_id: "issuer-1".into(),
        public_key: issuer.public_key(),
        attested_role: Role::SecurityAnalyst,
    });

    let policy = Arc::new(PolicyStore::load(&dirs.path().join("policy.json")));
    let audit = Arc::new(
        AuditLog::open(&dirs.path().join("audit"), 8 * 1024 * 1024).expect("open audit log"),
    );
    let reachability: Arc<dyn ReachabilityProbe> = Arc::new(FixedReachability(reachable));

    let pipeline = AdmissionPipeline::new(
        agent_id,
        keys,
        Arc::clone(&policy),
        Arc::clone(&audit),
        reachability,
    );

    let rollback =
        RollbackEngine::new(&dirs.path().join("rollback"), ArtifactKey::generate()).expect("rollback engine");
    let executor = ActionExecutor::new(
        driver,
        rollback,
        dirs.path().join("quarantine").to_string_lossy().into_owned(),
        Duration::from_secs(5),
    );

    let supervisor = warden_agentd::Supervisor::from_parts(agent_id, pipeline, executor, audit);

    Harness {
        supervisor,
        issuer,
        _dirs: dirs,
    }
}

fn signed_block_process(issuer: &SecretKey, pid: u32) -> Vec<u8> {
    let mut raw = RawCommand {
        command_id: Uuid::new_v4(),
        action_type: "BLOCK_PROCESS".into(),
        target: serde_json::json!({"pid": pid, "image_hash": "ab"}),
        incident_id: Uuid::new_v4(),
        tre_mode: "FULL_ENFORCE".into(),
        issued_by_user_id: "analyst-1".into(),
        issued_by_role: "SECURITY_ANALYST".into(),
        issued_at: chrono::Utc::now(),
        expires_at: chrono::Utc::now() + chrono::Duration::minutes(5),
        rollback_token: "00".repeat(32),
        approval_id: None,
        signature: String::new(),
        signing_key_id: "issuer-1".into(),
        signing_algorithm: "ed25519".into(),
        signed_at: chrono::Utc::now(),
    };
    sign(&mut raw, issuer);
    serde_json::to_vec(&raw).expect("serialize command")
}

fn sign(raw: &mut RawCommand, key: &SecretKey) {
    raw.signature = String::new();
    let payload = raw.signed_payload().expect("signed payload");
    raw.signature = key.sign(&payload).to_hex();
}

#[tokio::test]
async fn valid_command_is_accepted_and_executed() {
    let harness = build_harness(true, 4242);
    let bytes = signed_block_process(&harness.issuer, 4242);

    let receipt = harness
        .supervisor
        .handle_command(&bytes)
        .await
        .expect("handle_command");

    assert_eq!(receipt.outcome, Outcome::Executed);
    assert!(receipt.rollback_token.is_some());
}

#[tokio::test]
async fn replayed_command_id_is_rejected() {
    let harness = build_harness(true, 4242);
    let bytes = signed_block_process(&harness.issuer, 4242);

    let first = harness
        .supervisor
        .handle_command(&bytes)
        .await
        .expect("first submission");
    assert_eq!(first.outcome, Outcome::Executed);

    let second = harness
        .supervisor
        .handle_command(&bytes)
        .await
        .expect("replayed submission");
    assert_eq!(second.outcome, Outcome::Rejected("REPLAY".into()));
}

#[tokio::test]
async fn expired_command_is_rejected() {
    let harness = build_harness(true, 4242);
    let mut raw = RawCommand {
        command_id: Uuid::new_v4(),
        action_type: "BLOCK_PROCESS".into(),
        target: serde_json::json!({"pid": 4242u32, "image_hash": "ab"}),
        incident_id: Uuid::new_v4(),
        tre_mode: "FULL_ENFORCE".into(),
        issued_by_user_id: "analyst-1".into(),
        issued_by_role: "SECURITY_ANALYST".into(),
        issued_at: chrono::Utc::now() - chrono::Duration::minutes(10),
        expires_at: chrono::Utc::now() - chrono::Duration::seconds(1),
        rollback_token: "00".repeat(32),
        approval_id: None,
        signature: String::new(),
        signing_key_id: "issuer-1".into(),
        signing_algorithm: "ed25519".into(),
        signed_at: chrono::Utc::now(),
    };
    sign(&mut raw, &harness.issuer);
    let bytes = serde_json::to_vec(&raw).expect("serialize");

    let receipt = harness
        .supervisor
        .handle_command(&bytes)
        .await
        .expect("handle_command");
    assert_eq!(receipt.outcome, Outcome::Rejected("EXPIRED".into()));
}

#[tokio::test]
async fn unknown_signing_key_is_rejected() {
    let harness = build_harness(true, 4242);
    let impostor = SecretKey::generate();
    let mut raw = RawCommand {
        command_id: Uuid::new_v4(),
        action_type: "BLOCK_PROCESS".into(),
        target: serde_json::json!({"pid": 4242u32, "image_hash": "ab"}),
        incident_id: Uuid::new_v4(),
        tre_mode: "FULL_ENFORCE".into(),
        issued_by_user_id: "analyst-1".into(),
        issued_by_role: "SECURITY_ANALYST".into(),
        issued_at: chrono::Utc::now(),
        expires_at: chrono::Utc::now() + chrono::Duration::minutes(5),
        rollback_token: "00".repeat(32),
        approval_id: None,
        signature: String::new(),
        signing_key_id: "nobody-knows-this-key".into(),
        signing_algorithm: "ed25519".into(),
        signed_at: chrono::Utc::now(),
    };
    sign(&mut raw, &impostor);
    let bytes = serde_json::to_vec(&raw).expect("serialize");

    let receipt = harness
        .supervisor
        .handle_command(&bytes)
        .await
        .expect("handle_command");
    assert_eq!(receipt.outcome, Outcome::Rejected("UNKNOWN_ISSUER".into()));
}

#[tokio::test]
async fn destructive_action_without_approval_is_rejected() {
    let harness = build_harness(true, 4242);
    let mut raw = RawCommand {
        command_id: Uuid::new_v4(),
        action_type: "ISOLATE_HOST".into(),
        target: serde_json::json!({"interface": null}),
        incident_id: Uuid::new_v4(),
        tre_mode: "FULL_ENFORCE".into(),
        issued_by_user_id: "analyst-1".into(),
        issued_by_role: "SECURITY_ANALYST".into(),
        issued_at: chrono::Utc::now(),
        expires_at: chrono::Utc::now() + chrono::Duration::minutes(5),
        rollback_token: "00".repeat(32),
        approval_id: None,
        signature: String::new(),
        signing_key_id: "issuer-1".into(),
        signing_algorithm: "ed25519".into(),
        signed_at: chrono::Utc::now(),
    };
    sign(&mut raw, &harness.issuer);
    let bytes = serde_json::to_vec(&raw).expect("serialize");

    let receipt = harness
        .supervisor
        .handle_command(&bytes)
        .await
        .expect("handle_command");
    assert_eq!(receipt.outcome, Outcome::Rejected("APPROVAL_MISSING".into()));
}

#[tokio::test]
async fn unreachable_controller_with_no_cached_policy_denies_autonomously() {
    // No cached policy was ever installed, so the autonomous enforcer's
    // default-deny applies even though every earlier gate would otherwise
    // accept this command.
    let harness = build_harness(false, 4242);
    let bytes = signed_block_process(&harness.issuer, 4242);

    let receipt = harness
        .supervisor
        .handle_command(&bytes)
        .await
        .expect("handle_command");
    assert_eq!(receipt.outcome, Outcome::Rejected("POLICY".into()));
}

#[tokio::test]
async fn missing_process_rolls_back_with_precheck_mismatch() {
    // The fake driver starts with no process running at all, so the
    // precheck inside the executor fails and the command resolves to an
    // automatic rollback rather than a bare rejection.
    let harness = build_harness(true, 4242);
    let bytes = signed_block_process(&harness.issuer, 9999);

    let receipt = harness
        .supervisor
        .handle_command(&bytes)
        .await
        .expect("handle_command");
    match receipt.outcome {
        Outcome::FailedRolledBack(ref tag) => assert_eq!(tag, "PRECHECK_MISMATCH"),
        other => panic!("expected FAILED_ROLLED_BACK:PRECHECK_MISMATCH, got {other:?}"),
    }
    assert!(receipt.rollback_token.is_some());
}

#[tokio::test]
async fn rate_limit_rejects_the_101st_admission_attempt_in_a_window() {
    let harness = build_harness(true, 4242);

    for _ in 0..100 {
        let bytes = signed_block_process(&harness.issuer, 9999);
        let receipt = harness
            .supervisor
            .handle_command(&bytes)
            .await
            .expect("handle_command");
        // Each of these 100 targets a process the fake driver never ran,
        // so they all roll back on precheck rather than executing — the
        // point here is only that they consume the rate window.
        assert!(matches!(receipt.outcome, Outcome::FailedRolledBack(_)));
    }

    let bytes = signed_block_process(&harness.issuer, 9999);
    let receipt = harness
        .supervisor
        .handle_command(&bytes)
        .await
        .expect("handle_command");
    assert_eq!(receipt.outcome, Outcome::Rejected("RATE_LIMITED".into()));
}

#[tokio::test]
async fn intake_overflow_is_rejected_and_audited() {
    let harness = build_harness_with_driver(true, Arc::new(FakeOsDriver::with_process_slow(4242)));
    let supervisor = Arc::new(harness.supervisor);
    let (intake, worker) = warden_agentd::intake::spawn(Arc::clone(&supervisor), 1);

    // Every `process_snapshot` call takes 100 ms, so once the worker has
    // picked up the first submission the bounded channel (capacity 1)
    // fills from the second and every submission after that fails its
    // `try_send` outright.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let bytes = signed_block_process(&harness.issuer, 9999);
        let intake = intake.clone();
        handles.push(tokio::spawn(
            async move { intake.submit(bytes).await.expect("submit") },
        ));
    }

    let mut saw_rate_limited = false;
    for handle in handles {
        let receipt = handle.await.expect("join");
        if receipt.outcome == Outcome::Rejected("RATE_LIMITED".into()) {
            saw_rate_limited = true;
        }
    }

    drop(intake);
    worker.await.expect("worker join");
    assert!(
        saw_rate_limited,
        "expected at least one submission to overflow the bounded intake channel"
    );
}

#[test]
fn autonomous_decision_is_deterministic_given_no_policy() {
    assert_eq!(
        warden_admission::autonomous::evaluate(None, warden_types::ActionType::BlockProcess),
        AutonomousDecision::Deny
    );
}
