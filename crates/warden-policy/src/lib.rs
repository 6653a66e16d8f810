#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! Key & Policy Store: the trusted issuer key directory and the locally
//! cached last-known-good policy.

pub mod error;
pub mod key_directory;
pub mod policy_store;

pub use error::PolicyError;
pub use key_directory::{KeyDirectory, TrustedKey};
pub use policy_store::PolicyStore;
