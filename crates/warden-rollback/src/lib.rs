#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! Rollback Artifact Engine: captures a durable, encrypted artifact
//! sufficient to reverse an action before any executor runs.

pub mod artifact;
pub mod engine;
pub mod error;
pub mod key;

pub use artifact::{PriorState, ProcessDescriptor, RollbackArtifact};
pub use engine::RollbackEngine;
pub use error::RollbackError;
pub use key::ArtifactKey;
