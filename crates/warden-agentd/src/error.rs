use thiserror::Error;

/// Failures during process startup: key/policy load, audit chain open,
/// rollback key provisioning. Maps to exit code 2.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load trusted key directory: {0}")]
    Keys(#[from] warden_policy::PolicyError),
    #[error("failed to open audit chain: {0}")]
    Audit(#[from] warden_audit::AuditError),
    #[error("failed to provision rollback artifact key: {0}")]
    Rollback(#[from] warden_rollback::RollbackError),
    #[error("failed to resolve rollback artifact key passphrase: {0}")]
    Config(#[from] warden_config::ConfigError),
    #[error("failed to create directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
