//! The Rollback Artifact Engine: captures a durable, encrypted artifact
//! sufficient to reverse an action, before any executor is ever permitted
//! to apply it.

use rand::rngs::OsRng;
use rand::RngCore;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};

use warden_crypto::sha256_hex;
use warden_types::canonical::canonical_bytes;
use warden_types::ActionType;

use crate::artifact::{PriorState, RollbackArtifact};
use crate::error::RollbackError;
use crate::key::ArtifactKey;

const NONCE_LEN: usize = 12;

/// Owns the rollback artifact directory and the agent-local encryption key.
pub struct RollbackEngine {
    dir: PathBuf,
    key: ArtifactKey,
}

impl RollbackEngine {
    pub fn new(dir: &Path, key: ArtifactKey) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            key,
        })
    }

    fn artifact_path(&self, command_id: Uuid) -> PathBuf {
        self.dir.join(format!("{command_id}.artifact"))
    }

    /// Captures, encrypts, and durably persists the rollback artifact for
    /// `command_id` *before* any executor is permitted to run. Returns the
    /// artifact and its `rollback_token = SHA-256(canonical(artifact))`.
    ///
    /// Any failure here must be surfaced by the caller as
    /// `REJECTED:ROLLBACK_PREP_FAILED` with no side effects.
    pub fn capture(
        &self,
        command_id: Uuid,
        action_type: ActionType,
        prior_state: PriorState,
    ) -> Result<(RollbackArtifact, String), RollbackError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let artifact = RollbackArtifact {
            command_id,
            action_type,
            prior_state,
            capture_instant: chrono::Utc::now(),
            encryption_nonce: hex::encode(nonce_bytes),
        };

        let plaintext = canonical_bytes(&artifact)?;
        let rollback_token = sha256_hex(&plaintext);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(self.key.bytes()));
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| RollbackError::Malformed("artifact encryption failed".into()))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);

        self.write_durably(command_id, &envelope)?;

        tracing::info!(
            target: "warden_rollback",
            command_id = %command_id,
            action_type = %action_type,
            "rollback artifact captured"
        );

        Ok((artifact, rollback_token))
    }

    fn write_durably(&self, command_id: Uuid, envelope: &[u8]) -> Result<(), RollbackError> {
        let final_path = self.artifact_path(command_id);
        let tmp_path = final_path.with_extension("artifact.tmp");
        std::fs::write(&tmp_path, envelope)?;
        let file = std::fs::File::open(&tmp_path)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    pub fn exists(&self, command_id: Uuid) -> bool {
        self.artifact_path(command_id).exists()
    }

    /// Loads and decrypts a previously captured artifact, used by the
    /// rollback path when `apply` succeeds but `postverify` diverges.
    pub fn load(&self, command_id: Uuid) -> Result<RollbackArtifact, RollbackError> {
        let path = self.artifact_path(command_id);
        let envelope = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RollbackError::NotFound(command_id)
            } else {
                RollbackError::Io(e)
            }
        })?;
        if envelope.len() < NONCE_LEN {
            return Err(RollbackError::Malformed("artifact envelope too short".into()));
        }
        let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(self.key.bytes()));
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| RollbackError::Malformed("artifact decryption failed".into()))?;
        let artifact: RollbackArtifact = serde_json::from_slice(&plaintext)?;
        Ok(artifact)
    }
}
