#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! Action Executors and the platform adapter trait they run against.

pub mod error;
pub mod executor;
pub mod platform;

pub use error::ExecutorError;
pub use executor::{ActionExecutor, ExecutionOutcome, DEFAULT_SOFT_TIMEOUT};
pub use platform::unix::UnixOsDriver;
pub use platform::OsDriver;
