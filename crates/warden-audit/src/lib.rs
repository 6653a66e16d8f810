#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! Local Audit Log: an append-only, hash-chained, size-rotated record of
//! every admission outcome.

pub mod error;
pub mod log;
pub mod segment;

pub use error::AuditError;
pub use log::{AuditLog, DEFAULT_MAX_SEGMENT_BYTES};
pub use segment::SegmentIndex;
