#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! Cryptographic primitives for the Warden agent core: Ed25519 signature
//! verification, SHA-256 hashing for the audit chain and content-addressed
//! quarantine store, and at-rest encryption for the trusted-key directory
//! and rollback artifacts.

pub mod error;
pub mod hash;
pub mod key_store;
pub mod sign;

pub use error::CryptoError;
pub use hash::sha256_hex;
pub use sign::{PublicKey, SecretKey, Signature};
