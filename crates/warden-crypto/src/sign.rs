//! Ed25519 signing and verification.
//!
//! Verification must be constant-time and a verification failure must be
//! indistinguishable in timing from an unknown `signing_key_id`. We satisfy
//! that by never calling into the verification primitive at all
//! for an unknown key id (the caller rejects with `UNKNOWN_ISSUER` first);
//! once a key is known, `ed25519-dalek`'s `verify_strict` runs in
//! constant-time with respect to the message and signature.

use ed25519_dalek::{Signer, Verifier};
use rand::rngs::OsRng;

use crate::error::CryptoError;

/// An Ed25519 public (verifying) key.
#[derive(Clone)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

/// An Ed25519 private (signing) key.
#[derive(Clone)]
pub struct SecretKey(ed25519_dalek::SigningKey);

/// A detached Ed25519 signature.
#[derive(Clone)]
pub struct Signature(ed25519_dalek::Signature);

impl SecretKey {
    pub fn generate() -> Self {
        let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
        Self(signing_key)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32-byte seed".into()))?;
        Ok(Self(ed25519_dalek::SigningKey::from_bytes(&arr)))
    }
}

impl PublicKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32-byte public key".into()))?;
        ed25519_dalek::VerifyingKey::from_bytes(&arr)
            .map(PublicKey)
            .map_err(|e| CryptoError::InvalidKey(format!("malformed public key: {e}")))
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(s).map_err(|e| CryptoError::InvalidKey(format!("not hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verifies `signature` over `message`. Runs in constant time w.r.t. the
    /// message and signature contents.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature("expected 64 bytes".into()))?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&arr)))
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(s).map_err(|e| CryptoError::InvalidSignature(format!("not hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}
