#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! The Warden agent core's supervisor: startup, bounded command intake, and
//! graceful shutdown.

pub mod error;
pub mod exit;
pub mod intake;
pub mod supervisor;

pub use error::StartupError;
pub use intake::Intake;
pub use supervisor::Supervisor;
