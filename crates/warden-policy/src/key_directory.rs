//! The trusted issuer key directory.
//!
//! Keys are loaded from an immutable contract bundle directory and an
//! optional operator-provided directory; rotation is additive (old keys
//! remain trusted until the directory contents are explicitly replaced and
//! the supervisor restarted).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use warden_crypto::PublicKey;
use warden_types::Role;

use crate::error::PolicyError;

/// One `{ key_id, public_key }` entry, additionally carrying the
/// `issued_by_role` attestation the issuer identity check relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedKeyEntry {
    pub key_id: String,
    pub public_key_hex: String,
    pub attested_role: Role,
}

#[derive(Clone)]
pub struct TrustedKey {
    pub key_id: String,
    pub public_key: PublicKey,
    pub attested_role: Role,
}

/// A read-only, in-memory set of trusted keys.
#[derive(Default)]
pub struct KeyDirectory {
    keys: HashMap<String, TrustedKey>,
}

impl KeyDirectory {
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Loads the immutable contract bundle's key entries, then additively
    /// merges an optional operator-provided directory of further entries.
    /// Each directory is a flat set of `*.json` files, one [`TrustedKeyEntry`]
    /// per file.
    pub fn load(bundle_dir: &Path, operator_dir: Option<&Path>) -> Result<Self, PolicyError> {
        let mut dir = Self::empty();
        dir.merge_dir(bundle_dir)?;
        if let Some(op) = operator_dir {
            dir.merge_dir(op)?;
        }
        Ok(dir)
    }

    fn merge_dir(&mut self, path: &Path) -> Result<(), PolicyError> {
        if !path.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let p = entry.path();
            if p.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = std::fs::read_to_string(&p)?;
            let parsed: TrustedKeyEntry = serde_json::from_str(&contents)
                .map_err(|e| PolicyError::MalformedKey(format!("{}: {e}", p.display())))?;
            let public_key = PublicKey::from_hex(&parsed.public_key_hex)
                .map_err(|e| PolicyError::MalformedKey(format!("{}: {e}", p.display())))?;
            self.keys.insert(
                parsed.key_id.clone(),
                TrustedKey {
                    key_id: parsed.key_id,
                    public_key,
                    attested_role: parsed.attested_role,
                },
            );
        }
        Ok(())
    }

    /// Inserts or replaces a single key (used by tests and by operator
    /// tooling that provisions keys programmatically).
    pub fn insert(&mut self, key: TrustedKey) {
        self.keys.insert(key.key_id.clone(), key);
    }

    pub fn get(&self, key_id: &str) -> Option<&TrustedKey> {
        self.keys.get(key_id)
    }

    pub fn contains(&self, key_id: &str) -> bool {
        self.keys.contains_key(key_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_crypto::SecretKey;

    #[test]
    fn load_merges_bundle_and_operator_dirs() {
        let bundle = tempfile::tempdir().unwrap();
        let operator = tempfile::tempdir().unwrap();

        let sk1 = SecretKey::generate();
        let entry1 = TrustedKeyEntry {
            key_id: "bundle-key".into(),
            public_key_hex: sk1.public_key().to_hex(),
            attested_role: Role::SuperAdmin,
        };
        std::fs::write(
            bundle.path().join("bundle-key.json"),
            serde_json::to_string(&entry1).unwrap(),
        )
        .unwrap();

        let sk2 = SecretKey::generate();
        let entry2 = TrustedKeyEntry {
            key_id: "operator-key".into(),
            public_key_hex: sk2.public_key().to_hex(),
            attested_role: Role::SecurityAnalyst,
        };
        std::fs::write(
            operator.path().join("operator-key.json"),
            serde_json::to_string(&entry2).unwrap(),
        )
        .unwrap();

        let dir = KeyDirectory::load(bundle.path(), Some(operator.path())).unwrap();
        assert_eq!(dir.len(), 2);
        assert!(dir.contains("bundle-key"));
        assert!(dir.contains("operator-key"));
    }

    #[test]
    fn unknown_key_is_absent() {
        let dir = KeyDirectory::empty();
        assert!(dir.get("nonexistent").is_none());
    }
}
