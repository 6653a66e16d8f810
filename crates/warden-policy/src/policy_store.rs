//! The cached last-known-good policy.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use warden_crypto::hash::sha256_hex;
use warden_types::CachedPolicy;

use crate::error::PolicyError;

/// Holds the effective cached policy. Many readers (the autonomous
/// enforcer, operators), a single writer (policy installation).
pub struct PolicyStore {
    path: PathBuf,
    current: RwLock<Option<CachedPolicy>>,
}

impl PolicyStore {
    /// Loads the on-disk cached policy. If the file is absent, unparsable,
    /// or fails its integrity check, the effective policy is `None` (deny
    /// all) rather than an error.
    pub fn load(path: &Path) -> Self {
        let current = Self::read_and_verify(path).unwrap_or(None);
        Self {
            path: path.to_path_buf(),
            current: RwLock::new(current),
        }
    }

    fn read_and_verify(path: &Path) -> Result<Option<CachedPolicy>, PolicyError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        let policy: CachedPolicy = serde_json::from_str(&contents)?;
        if verify_integrity(&policy)? {
            Ok(Some(policy))
        } else {
            tracing::warn!(
                target: "warden_policy",
                "cached policy on disk failed integrity check; treating as absent"
            );
            Ok(None)
        }
    }

    /// The current effective policy, or `None` meaning deny-all.
    pub fn current_policy(&self) -> Option<CachedPolicy> {
        self.current.read().clone()
    }

    /// Installs a newly received, signed policy candidate. Recomputes the
    /// integrity hash; on any mismatch the candidate is discarded and the
    /// previously trusted policy remains effective.
    pub fn install_policy(&self, candidate: CachedPolicy) -> Result<(), PolicyError> {
        if !verify_integrity(&candidate)? {
            return Err(PolicyError::MalformedPolicy(
                "integrity_hash does not match canonical policy bytes".into(),
            ));
        }
        self.persist(&candidate)?;
        *self.current.write() = Some(candidate);
        Ok(())
    }

    fn persist(&self, policy: &CachedPolicy) -> Result<(), PolicyError> {
        let serialized = serde_json::to_string_pretty(policy)?;
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &serialized)?;
        let file = std::fs::File::open(&tmp_path)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Recomputes `integrity_hash` over the canonical policy bytes (minus the
/// hash field itself) and compares.
pub fn verify_integrity(policy: &CachedPolicy) -> Result<bool, PolicyError> {
    let bytes = policy.hashable_bytes()?;
    Ok(sha256_hex(&bytes) == policy.integrity_hash)
}

/// Computes the `integrity_hash` for a freshly constructed policy, for use
/// by operator tooling that authors cached-policy files.
pub fn compute_integrity_hash(policy: &CachedPolicy) -> Result<String, PolicyError> {
    Ok(sha256_hex(&policy.hashable_bytes()?))
}
