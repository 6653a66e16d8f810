//! # Warden Telemetry
//!
//! Observability infrastructure for the Warden agent core: structured
//! logging initialization, a Prometheus metrics endpoint, and abstract
//! sinks that decouple the admission/execution/audit logic from the
//! metrics backend.

/// A lightweight HTTP server exposing `/metrics`, `/healthz`, `/readyz`.
pub mod http;
/// Global structured-logging initialization.
pub mod init;
/// Concrete metric sinks backed by the `prometheus` crate.
pub mod prometheus_sink;
/// Abstract traits defining the metrics-reporting contract.
pub mod sinks;

pub use sinks::{admission_metrics, audit_metrics, executor_metrics};
