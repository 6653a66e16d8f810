//! Unix platform adapter. Shells out to the standard coreutils/iproute2/
//! systemd tooling present on any EDR-managed Linux host, offloading each
//! blocking call to a worker thread via `spawn_blocking`.

use async_trait::async_trait;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::process::{Command, Output};

use warden_crypto::sha256_hex;

use super::{
    InterfaceSnapshot, KilledProcess, OsDriver, ProcessSnapshot, QuarantinedFile, ServiceSnapshot,
    UserSnapshot,
};
use crate::error::ExecutorError;

/// Adapter grounded on coreutils, `iproute2`, `iptables`, and `systemd`
/// tooling available on the managed host; no action here talks to the
/// kernel directly.
#[derive(Default, Clone)]
pub struct UnixOsDriver;

impl UnixOsDriver {
    pub fn new() -> Self {
        Self
    }
}

async fn run(program: &'static str, args: Vec<String>) -> Result<Output, ExecutorError> {
    tokio::task::spawn_blocking(move || Command::new(program).args(&args).output())
        .await
        .map_err(|e| ExecutorError::Apply(format!("join error running {program}: {e}")))?
        .map_err(ExecutorError::Io)
}

fn ok(output: &Output) -> bool {
    output.status.success()
}

#[async_trait]
impl OsDriver for UnixOsDriver {
    async fn process_snapshot(&self, pid: u32) -> Result<ProcessSnapshot, ExecutorError> {
        let proc_dir = format!("/proc/{pid}");
        let exists = Path::new(&proc_dir).exists();
        if !exists {
            return Ok(ProcessSnapshot {
                exists: false,
                image_path: String::new(),
                parent_pid: 0,
                executable_hash: String::new(),
                command_line: String::new(),
            });
        }

        let image_path = fs::read_link(format!("{proc_dir}/exe"))
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let command_line = fs::read(format!("{proc_dir}/cmdline"))
            .map(|bytes| {
                bytes
                    .split(|b| *b == 0)
                    .filter(|s| !s.is_empty())
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        let parent_pid = fs::read_to_string(format!("{proc_dir}/stat"))
            .ok()
            .and_then(|stat| {
                let after_comm = stat.rsplit_once(')')?.1;
                after_comm.split_whitespace().nth(1)?.parse::<u32>().ok()
            })
            .unwrap_or(0);
        let executable_hash = if image_path.is_empty() {
            String::new()
        } else {
            fs::read(&image_path)
                .map(|bytes| sha256_hex(&bytes))
                .unwrap_or_default()
        };

        Ok(ProcessSnapshot {
            exists: true,
            image_path,
            parent_pid,
            executable_hash,
            command_line,
        })
    }

    async fn kill_process(&self, pid: u32) -> Result<(), ExecutorError> {
        let output = run("kill", vec!["-9".to_string(), pid.to_string()]).await?;
        if ok(&output) || !Path::new(&format!("/proc/{pid}")).exists() {
            return Ok(());
        }
        Err(ExecutorError::Apply(format!(
            "kill -9 {pid} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )))
    }

    async fn process_running(&self, pid: u32) -> Result<bool, ExecutorError> {
        Ok(Path::new(&format!("/proc/{pid}")).exists())
    }

    async fn insert_firewall_rule(&self, rule_text: &str) -> Result<String, ExecutorError> {
        let args: Vec<String> = std::iter::once("-A".to_string())
            .chain(rule_text.split_whitespace().map(str::to_string))
            .collect();
        let output = run("iptables", args).await?;
        if !ok(&output) {
            return Err(ExecutorError::Apply(format!(
                "iptables insert failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(format!("iptables:{rule_text}"))
    }

    async fn remove_firewall_rule(&self, handle: &str) -> Result<(), ExecutorError> {
        let rule_text = handle.strip_prefix("iptables:").unwrap_or(handle);
        let args: Vec<String> = std::iter::once("-D".to_string())
            .chain(rule_text.split_whitespace().map(str::to_string))
            .collect();
        let output = run("iptables", args).await?;
        if ok(&output) {
            Ok(())
        } else {
            Err(ExecutorError::Apply(format!(
                "iptables removal failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }

    async fn firewall_rule_present(&self, handle: &str) -> Result<bool, ExecutorError> {
        let rule_text = handle.strip_prefix("iptables:").unwrap_or(handle);
        let args: Vec<String> = std::iter::once("-C".to_string())
            .chain(rule_text.split_whitespace().map(str::to_string))
            .collect();
        let output = run("iptables", args).await?;
        Ok(ok(&output))
    }

    async fn path_exists(&self, path: &str) -> Result<bool, ExecutorError> {
        Ok(Path::new(path).exists())
    }

    async fn file_snapshot(&self, path: &str) -> Result<QuarantinedFile, ExecutorError> {
        let metadata = fs::metadata(path)?;
        let content = fs::read(path)?;
        Ok(QuarantinedFile {
            owner: metadata.uid().to_string(),
            mode: metadata.mode(),
            xattrs: Vec::new(),
            content_hash: sha256_hex(&content),
        })
    }

    async fn quarantine_file(
        &self,
        original_path: &str,
        quarantine_dir: &str,
    ) -> Result<QuarantinedFile, ExecutorError> {
        let snapshot = self.file_snapshot(original_path).await?;

        fs::create_dir_all(quarantine_dir)?;
        let destination = Path::new(quarantine_dir).join(&snapshot.content_hash);
        fs::rename(original_path, &destination)?;

        Ok(snapshot)
    }

    async fn restore_file(
        &self,
        original_path: &str,
        quarantine_dir: &str,
        content_hash: &str,
        owner: &str,
        mode: u32,
    ) -> Result<(), ExecutorError> {
        let source = Path::new(quarantine_dir).join(content_hash);
        fs::rename(&source, original_path)?;
        let uid: u32 = owner
            .parse()
            .map_err(|_| ExecutorError::Apply(format!("malformed owner uid: {owner}")))?;
        let _ = run(
            "chown",
            vec![uid.to_string(), original_path.to_string()],
        )
        .await?;
        let _ = run(
            "chmod",
            vec![format!("{:o}", mode & 0o7777), original_path.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn interface_snapshot(&self, interface: &str) -> Result<InterfaceSnapshot, ExecutorError> {
        let output = run("ip", vec!["addr".into(), "show".into(), interface.into()]).await?;
        let text = String::from_utf8_lossy(&output.stdout);
        let was_up = text.contains("state UP") || text.contains(",UP,");
        let addresses = text
            .lines()
            .filter(|l| l.trim_start().starts_with("inet"))
            .map(|l| l.trim().to_string())
            .collect();
        let routes_output = run("ip", vec!["route".into(), "show".into(), "dev".into(), interface.into()]).await?;
        let routes = String::from_utf8_lossy(&routes_output.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        Ok(InterfaceSnapshot {
            was_up,
            addresses,
            routes,
        })
    }

    async fn set_interface_up(&self, interface: &str, up: bool) -> Result<(), ExecutorError> {
        let state = if up { "up" } else { "down" };
        let output = run(
            "ip",
            vec!["link".into(), "set".into(), interface.into(), state.into()],
        )
        .await?;
        if ok(&output) {
            Ok(())
        } else {
            Err(ExecutorError::Apply(format!(
                "ip link set {interface} {state} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }

    async fn user_snapshot(&self, user_id: &str) -> Result<UserSnapshot, ExecutorError> {
        let output = run("passwd", vec!["-S".into(), user_id.into()]).await?;
        let text = String::from_utf8_lossy(&output.stdout);
        let account_enabled = text.split_whitespace().nth(1).map(|s| s != "L").unwrap_or(true);
        Ok(UserSnapshot {
            account_enabled,
            session_ids: Vec::new(),
        })
    }

    async fn set_user_enabled(&self, user_id: &str, enabled: bool) -> Result<(), ExecutorError> {
        let flag = if enabled { "-U" } else { "-L" };
        let output = run("usermod", vec![flag.into(), user_id.into()]).await?;
        if ok(&output) {
            Ok(())
        } else {
            Err(ExecutorError::Apply(format!(
                "usermod {flag} {user_id} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }

    async fn terminate_user_sessions(&self, user_id: &str) -> Result<Vec<String>, ExecutorError> {
        let list = run("loginctl", vec!["list-sessions".into(), "--no-legend".into()]).await?;
        let session_ids: Vec<String> = String::from_utf8_lossy(&list.stdout)
            .lines()
            .filter(|l| l.contains(user_id))
            .filter_map(|l| l.split_whitespace().next().map(str::to_string))
            .collect();
        for session in &session_ids {
            let _ = run("loginctl", vec!["terminate-session".into(), session.clone()]).await?;
        }
        Ok(session_ids)
    }

    async fn service_snapshot(&self, service_name: &str) -> Result<ServiceSnapshot, ExecutorError> {
        let enabled = run("systemctl", vec!["is-enabled".into(), service_name.into()]).await?;
        let running = run("systemctl", vec!["is-active".into(), service_name.into()]).await?;
        Ok(ServiceSnapshot {
            was_enabled: ok(&enabled),
            was_running: ok(&running),
        })
    }

    async fn set_service(
        &self,
        service_name: &str,
        enabled: bool,
        running: bool,
    ) -> Result<(), ExecutorError> {
        let enable_flag = if enabled { "enable" } else { "disable" };
        let enable_output = run("systemctl", vec![enable_flag.into(), service_name.into()]).await?;
        if !ok(&enable_output) {
            return Err(ExecutorError::Apply(format!(
                "systemctl {enable_flag} {service_name} failed: {}",
                String::from_utf8_lossy(&enable_output.stderr)
            )));
        }
        let run_flag = if running { "start" } else { "stop" };
        let run_output = run("systemctl", vec![run_flag.into(), service_name.into()]).await?;
        if ok(&run_output) {
            Ok(())
        } else {
            Err(ExecutorError::Apply(format!(
                "systemctl {run_flag} {service_name} failed: {}",
                String::from_utf8_lossy(&run_output.stderr)
            )))
        }
    }

    async fn isolate_segment(&self, cidr: &str, isolate: bool) -> Result<(), ExecutorError> {
        let verb = if isolate { "-I" } else { "-D" };
        let output = run(
            "iptables",
            vec![
                verb.into(),
                "FORWARD".into(),
                "-s".into(),
                cidr.into(),
                "-j".into(),
                "DROP".into(),
            ],
        )
        .await?;
        if ok(&output) {
            Ok(())
        } else {
            Err(ExecutorError::Apply(format!(
                "segment isolation for {cidr} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }

    async fn mass_kill(&self, pids: &[u32]) -> Result<Vec<KilledProcess>, ExecutorError> {
        let mut killed = Vec::with_capacity(pids.len());
        for &pid in pids {
            let snapshot = self.process_snapshot(pid).await?;
            if snapshot.exists {
                self.kill_process(pid).await?;
            }
            killed.push(KilledProcess {
                pid,
                image_hash: snapshot.executable_hash,
                parent_pid: snapshot.parent_pid,
            });
        }
        Ok(killed)
    }
}
