#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! Wire types, canonical serialization, and the shared error taxonomy for the
//! Warden agent command acceptance & enforcement core.
//!
//! Every other crate in the workspace depends on this one for the closed set
//! of command/target/audit/policy shapes, so that the frozen wire contract
//! lives in exactly one place.

pub mod canonical;
pub mod command;
pub mod error;
pub mod policy;
pub mod receipt;
pub mod record;

pub use canonical::{canonical_bytes, CanonicalError};
pub use command::{
    ActionType, Command, RawCommand, Role, Target, TreMode, DESTRUCTIVE_ACTIONS,
};
pub use error::{FailureKind, RejectionKind};
pub use policy::CachedPolicy;
pub use receipt::{ExecutionReceipt, Outcome};
pub use record::{AuditRecord, EventType};
