//! Abstract traits for metrics reporting, decoupling the admission pipeline,
//! executors, and audit log from whichever metrics backend is installed.

use once_cell::sync::OnceCell;

/// A no-op sink for tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the installed [`MetricsSink`].
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Installs the global metrics sink. Intended to be called once at startup.
pub fn install(sink: &'static dyn MetricsSink) {
    let _ = SINK.set(sink);
}

pub fn admission_metrics() -> &'static dyn AdmissionMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

pub fn executor_metrics() -> &'static dyn ExecutorMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

pub fn audit_metrics() -> &'static dyn AuditMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Metrics emitted by the admission pipeline.
pub trait AdmissionMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for commands accepted.
    fn inc_accepted(&self);
    /// Increments a counter for commands rejected, labeled by rejection tag.
    fn inc_rejected(&self, reason: &'static str);
    /// Increments a counter for autonomous-enforcement decisions, labeled
    /// `ALLOW`/`DENY`.
    fn inc_autonomous_decision(&self, decision: &'static str);
    /// Observes the end-to-end admission gate latency.
    fn observe_admission_latency(&self, duration_secs: f64);
}
impl AdmissionMetricsSink for NopSink {
    fn inc_accepted(&self) {}
    fn inc_rejected(&self, _reason: &'static str) {}
    fn inc_autonomous_decision(&self, _decision: &'static str) {}
    fn observe_admission_latency(&self, _duration_secs: f64) {}
}

/// Metrics emitted by action executors.
pub trait ExecutorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for successful executions, labeled by action type.
    fn inc_executed(&self, action_type: &'static str);
    /// Increments a counter for rolled-back executions, labeled by reason.
    fn inc_rolled_back(&self, action_type: &'static str, reason: &'static str);
    /// Observes the duration of a single executor run.
    fn observe_execution_duration(&self, action_type: &'static str, duration_secs: f64);
}
impl ExecutorMetricsSink for NopSink {
    fn inc_executed(&self, _action_type: &'static str) {}
    fn inc_rolled_back(&self, _action_type: &'static str, _reason: &'static str) {}
    fn observe_execution_duration(&self, _action_type: &'static str, _duration_secs: f64) {}
}

/// Metrics emitted by the local audit log.
pub trait AuditMetricsSink: Send + Sync + std::fmt::Debug {
    /// Sets the gauge for the current chain sequence number.
    fn set_sequence(&self, sequence: u64);
    /// Increments a counter for segment rotations.
    fn inc_segment_rotations(&self);
    /// Increments a counter for fatal audit write failures.
    fn inc_write_failures(&self);
}
impl AuditMetricsSink for NopSink {
    fn set_sequence(&self, _sequence: u64) {}
    fn inc_segment_rotations(&self) {}
    fn inc_write_failures(&self) {}
}

/// A unified sink implementing all domain traits; a single point of
/// implementation for a concrete backend such as Prometheus.
pub trait MetricsSink: AdmissionMetricsSink + ExecutorMetricsSink + AuditMetricsSink {}
impl<T> MetricsSink for T where T: AdmissionMetricsSink + ExecutorMetricsSink + AuditMetricsSink {}
