#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! Clock & Nonce Store, Admission Pipeline, and Autonomous Policy Enforcer.

pub mod approval;
pub mod autonomous;
pub mod error;
pub mod freshness;
pub mod permission;
pub mod pipeline;

pub use autonomous::{AutonomousDecision, HttpReachabilityProbe, ReachabilityProbe};
pub use error::FatalError;
pub use freshness::{Freshness, NonceCache, RateWindow};
pub use pipeline::{AdmissionOutcome, AdmissionPipeline};
