//! Secure storage for sensitive local secrets: the operator-provided
//! trusted-key directory's unlocking passphrase, and the agent-local
//! symmetric key used to encrypt rollback artifacts at rest.
//!
//! Format V1:
//! ```text
//! [ Magic: "WARDGKEY" (8) ]
//! [ Version: u16 (2) ]
//! [ KDF Algo: u8 (1) ]
//! [ KDF Mem KiB: u32 (4) ]
//! [ KDF Iters: u32 (4) ]
//! [ KDF Lanes: u8 (1) ]
//! [ Salt: 16B ]
//! [ AEAD Algo: u8 (1) ]
//! [ Nonce: 12B ]
//! [ Ciphertext + Tag: N + 16 ]
//! ```

use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::{rngs::OsRng, RngCore};
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

const HEADER_MAGIC: &[u8; 8] = b"WARDGKEY";
const HEADER_VERSION: u16 = 1;
const HEADER_LEN: usize = 8 + 2 + 1 + 4 + 4 + 1 + 16 + 1 + 12; // 49 bytes

const KDF_ALGO_ARGON2ID: u8 = 1;
const KDF_MEM_KIB: u32 = 64 * 1024;
const KDF_ITERS: u32 = 3;
const KDF_LANES: u8 = 4;
const SALT_LEN: usize = 16;
const AEAD_ALGO_CHACHA20POLY1305: u8 = 1;
const NONCE_LEN: usize = 12;
const KEK_LEN: usize = 32;

/// A byte buffer that zeroizes itself on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SensitiveBytes(pub Vec<u8>);

fn derive_kek(passphrase: &str, salt: &[u8]) -> Result<[u8; KEK_LEN], CryptoError> {
    let params = argon2::Params::new(KDF_MEM_KIB, KDF_ITERS, KDF_LANES as u32, Some(KEK_LEN))
        .map_err(|e| CryptoError::OperationFailed(format!("invalid Argon2 params: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
    let mut kek = [0u8; KEK_LEN];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut kek)
        .map_err(|e| CryptoError::OperationFailed(format!("Argon2 derivation failed: {e}")))?;
    Ok(kek)
}

/// Encrypts `secret` under `passphrase`, producing the versioned V1 envelope.
pub fn encrypt_secret(secret: &[u8], passphrase: &str) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce_bytes);

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(HEADER_MAGIC);
    header.extend_from_slice(&HEADER_VERSION.to_be_bytes());
    header.push(KDF_ALGO_ARGON2ID);
    header.extend_from_slice(&KDF_MEM_KIB.to_be_bytes());
    header.extend_from_slice(&KDF_ITERS.to_be_bytes());
    header.push(KDF_LANES);
    header.extend_from_slice(&salt);
    header.push(AEAD_ALGO_CHACHA20POLY1305);
    header.extend_from_slice(&nonce_bytes);
    debug_assert_eq!(header.len(), HEADER_LEN);

    let kek = derive_kek(passphrase, &salt)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&kek));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, secret)
        .map_err(|_| CryptoError::OperationFailed("encryption failed".into()))?;

    let mut output = header;
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypts a V1 envelope produced by [`encrypt_secret`].
pub fn decrypt_secret(data: &[u8], passphrase: &str) -> Result<SensitiveBytes, CryptoError> {
    if data.len() < HEADER_LEN {
        return Err(CryptoError::InvalidInput("file too short".into()));
    }
    let magic = &data[0..8];
    if magic != HEADER_MAGIC {
        return Err(CryptoError::InvalidInput("invalid file signature".into()));
    }
    let version = u16::from_be_bytes([data[8], data[9]]);
    if version != HEADER_VERSION {
        return Err(CryptoError::Unsupported(format!(
            "unsupported key format version: {version}"
        )));
    }
    let salt = &data[20..36];
    let nonce_bytes = &data[37..49];
    let ciphertext = &data[HEADER_LEN..];

    let kek = derive_kek(passphrase, salt)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&kek));
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| {
        CryptoError::OperationFailed("decryption failed (wrong passphrase or corrupted file)".into())
    })?;
    Ok(SensitiveBytes(plaintext))
}

/// Loads and decrypts a secret file from disk.
pub fn load_encrypted_file(path: &Path, passphrase: &str) -> Result<SensitiveBytes, CryptoError> {
    let bytes = std::fs::read(path)
        .map_err(|e| CryptoError::InvalidInput(format!("failed to read key file: {e}")))?;
    decrypt_secret(&bytes, passphrase)
}
