//! The agent-local symmetric key used to encrypt rollback artifacts at rest.
//!
//! The key itself is a random 32-byte seed, held only in memory, and is
//! provisioned to disk wrapped in the passphrase-protected envelope defined
//! by `warden_crypto::key_store`.

use rand::rngs::OsRng;
use rand::RngCore;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

use warden_crypto::key_store;

use crate::error::RollbackError;

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ArtifactKey([u8; 32]);

impl ArtifactKey {
    /// Generates a fresh random key. Used the first time an agent starts up
    /// with no provisioned key file.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Unwraps a key previously sealed by [`ArtifactKey::seal`].
    pub fn unlock(path: &Path, passphrase: &str) -> Result<Self, RollbackError> {
        let sensitive = key_store::load_encrypted_file(path, passphrase)?;
        let arr: [u8; 32] = sensitive
            .0
            .as_slice()
            .try_into()
            .map_err(|_| RollbackError::Malformed("artifact key is not 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Seals this key to disk, encrypted under `passphrase`, atomically
    /// (write-to-temp + `fsync` + rename).
    pub fn seal(&self, path: &Path, passphrase: &str) -> Result<(), RollbackError> {
        let envelope = key_store::encrypt_secret(&self.0, passphrase)?;
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &envelope)?;
        let file = std::fs::File::open(&tmp_path)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_unlock_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.key");
        let key = ArtifactKey::generate();
        key.seal(&path, "passphrase").unwrap();

        let unlocked = ArtifactKey::unlock(&path, "passphrase").unwrap();
        assert_eq!(unlocked.bytes(), key.bytes());
    }

    #[test]
    fn wrong_passphrase_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.key");
        ArtifactKey::generate().seal(&path, "right").unwrap();
        assert!(ArtifactKey::unlock(&path, "wrong").is_err());
    }
}
