#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! Configuration loading for the Warden agent core (`warden.toml`).
//!
//! Every directory and path the supervisor needs to wire up the key
//! directory, cached policy, audit log, rollback engine, and executors at
//! startup lives in one TOML-backed, `serde`-derived struct.

mod error;

pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_max_segment_bytes() -> u64 {
    16 * 1024 * 1024
}

fn default_intake_capacity() -> usize {
    64
}

fn default_soft_timeout_secs() -> u64 {
    30
}

fn default_reachability_timeout_secs() -> u64 {
    2
}

/// Where the append-only local audit chain lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub directory: PathBuf,
    #[serde(default = "default_max_segment_bytes")]
    pub max_segment_bytes: u64,
}

/// Where rollback artifacts and the at-rest encryption key live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackConfig {
    pub directory: PathBuf,
    pub artifact_key_path: PathBuf,
    /// `"env:VAR_NAME"` to read the unlock passphrase from an environment
    /// variable, or `"file:/path"` to read it from a file.
    pub artifact_key_passphrase_source: String,
}

/// Trusted issuer keys: an immutable contract bundle plus an optional
/// operator-provided directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    pub bundle_dir: PathBuf,
    #[serde(default)]
    pub operator_dir: Option<PathBuf>,
}

/// Where the last-known-good cached policy is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub cached_policy_path: PathBuf,
}

/// How the agent reaches the central controller for the reachability probe
/// the autonomous enforcer uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub health_check_url: String,
    #[serde(default = "default_reachability_timeout_secs")]
    pub reachability_timeout_secs: u64,
}

impl ControllerConfig {
    pub fn reachability_timeout(&self) -> Duration {
        Duration::from_secs(self.reachability_timeout_secs)
    }
}

/// The whole agent configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub audit: AuditConfig,
    pub rollback: RollbackConfig,
    pub keys: KeysConfig,
    pub policy: PolicyConfig,
    pub controller: ControllerConfig,
    pub quarantine_dir: PathBuf,
    /// Bounded intake channel capacity (at most 64); overflow is
    /// `RATE_LIMITED`, never queued.
    #[serde(default = "default_intake_capacity")]
    pub intake_channel_capacity: usize,
    #[serde(default = "default_soft_timeout_secs")]
    pub soft_timeout_secs: u64,
}

impl Config {
    pub fn soft_timeout(&self) -> Duration {
        Duration::from_secs(self.soft_timeout_secs)
    }

    /// Loads and validates a configuration file (the agent's own config
    /// format, not the wire protocol).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.intake_channel_capacity == 0 || self.intake_channel_capacity > 64 {
            return Err(ConfigError::Invalid(
                "intake_channel_capacity must be in 1..=64".into(),
            ));
        }
        if self.soft_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "soft_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.audit.max_segment_bytes == 0 {
            return Err(ConfigError::Invalid(
                "audit.max_segment_bytes must be greater than 0".into(),
            ));
        }
        if self.controller.health_check_url.is_empty() {
            return Err(ConfigError::Invalid(
                "controller.health_check_url must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Resolves the rollback artifact key's unlock passphrase from the
    /// configured source.
    pub fn resolve_artifact_key_passphrase(&self) -> Result<String, ConfigError> {
        resolve_source(&self.rollback.artifact_key_passphrase_source)
    }
}

fn resolve_source(source: &str) -> Result<String, ConfigError> {
    if let Some(var) = source.strip_prefix("env:") {
        std::env::var(var)
            .map_err(|_| ConfigError::Invalid(format!("environment variable {var} is not set")))
    } else if let Some(path) = source.strip_prefix("file:") {
        fs::read_to_string(path)
            .map(|s| s.trim_end().to_string())
            .map_err(|source| ConfigError::Io {
                path: path.to_string(),
                source,
            })
    } else {
        Err(ConfigError::PassphraseSource(source.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
            quarantine_dir = "/var/lib/warden/quarantine"

            [audit]
            directory = "/var/lib/warden/audit"

            [rollback]
            directory = "/var/lib/warden/rollback"
            artifact_key_path = "/var/lib/warden/rollback/artifact.key"
            artifact_key_passphrase_source = "env:WARDEN_ARTIFACT_KEY_PASSPHRASE"

            [keys]
            bundle_dir = "/etc/warden/keys"

            [policy]
            cached_policy_path = "/var/lib/warden/policy.json"

            [controller]
            health_check_url = "https://tre.internal/healthz"
        "#
    }

    #[test]
    fn parses_with_defaults_applied() {
        let config: Config = toml::from_str(sample_toml()).unwrap();
        assert_eq!(config.intake_channel_capacity, 64);
        assert_eq!(config.soft_timeout_secs, 30);
        assert_eq!(config.controller.reachability_timeout_secs, 2);
        assert!(config.keys.operator_dir.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_intake_capacity_above_sixty_four() {
        let mut config: Config = toml::from_str(sample_toml()).unwrap();
        config.intake_channel_capacity = 65;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        fs::write(&path, sample_toml()).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.quarantine_dir, PathBuf::from("/var/lib/warden/quarantine"));
    }

    #[test]
    fn env_passphrase_source_resolves() {
        std::env::set_var("WARDEN_TEST_PASSPHRASE", "hunter2");
        assert_eq!(resolve_source("env:WARDEN_TEST_PASSPHRASE").unwrap(), "hunter2");
        std::env::remove_var("WARDEN_TEST_PASSPHRASE");
    }

    #[test]
    fn unknown_passphrase_source_is_rejected() {
        assert!(resolve_source("vault:secret/warden").is_err());
    }
}
