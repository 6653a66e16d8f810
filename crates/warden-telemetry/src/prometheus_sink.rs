//! Concrete metric sink implementation backed by the `prometheus` crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, Gauge, HistogramVec,
    IntCounterVec,
};

static COMMANDS_ACCEPTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static COMMANDS_REJECTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static AUTONOMOUS_DECISIONS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static ADMISSION_LATENCY_SECONDS: OnceCell<HistogramVec> = OnceCell::new();
static EXECUTIONS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static ROLLBACKS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static EXECUTION_DURATION_SECONDS: OnceCell<HistogramVec> = OnceCell::new();
static AUDIT_SEQUENCE: OnceCell<Gauge> = OnceCell::new();
static AUDIT_SEGMENT_ROTATIONS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static AUDIT_WRITE_FAILURES_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Registers every collector exactly once. Must be called before any sink
/// method is invoked; subsequent calls are no-ops.
pub fn install() -> Result<(), prometheus::Error> {
    let _ = COMMANDS_ACCEPTED_TOTAL.get_or_try_init(|| {
        register_int_counter_vec!(
            "warden_commands_accepted_total",
            "Commands accepted by the admission pipeline",
            &["action_type"]
        )
    })?;
    let _ = COMMANDS_REJECTED_TOTAL.get_or_try_init(|| {
        register_int_counter_vec!(
            "warden_commands_rejected_total",
            "Commands rejected by the admission pipeline",
            &["reason"]
        )
    })?;
    let _ = AUTONOMOUS_DECISIONS_TOTAL.get_or_try_init(|| {
        register_int_counter_vec!(
            "warden_autonomous_decisions_total",
            "Autonomous policy enforcer decisions",
            &["decision"]
        )
    })?;
    let _ = ADMISSION_LATENCY_SECONDS.get_or_try_init(|| {
        register_histogram_vec!(
            "warden_admission_latency_seconds",
            "Admission gate latency",
            &["outcome"]
        )
    })?;
    let _ = EXECUTIONS_TOTAL.get_or_try_init(|| {
        register_int_counter_vec!(
            "warden_executions_total",
            "Successful action executions",
            &["action_type"]
        )
    })?;
    let _ = ROLLBACKS_TOTAL.get_or_try_init(|| {
        register_int_counter_vec!(
            "warden_rollbacks_total",
            "Rollbacks triggered after execution",
            &["action_type", "reason"]
        )
    })?;
    let _ = EXECUTION_DURATION_SECONDS.get_or_try_init(|| {
        register_histogram_vec!(
            "warden_execution_duration_seconds",
            "Executor run duration",
            &["action_type"]
        )
    })?;
    let _ = AUDIT_SEQUENCE
        .get_or_try_init(|| register_gauge!("warden_audit_sequence", "Current audit chain sequence"))?;
    let _ = AUDIT_SEGMENT_ROTATIONS_TOTAL.get_or_try_init(|| {
        register_int_counter_vec!(
            "warden_audit_segment_rotations_total",
            "Audit log segment rotations",
            &["_unused"]
        )
    })?;
    let _ = AUDIT_WRITE_FAILURES_TOTAL.get_or_try_init(|| {
        register_int_counter_vec!(
            "warden_audit_write_failures_total",
            "Fatal audit log write failures",
            &["_unused"]
        )
    })?;
    Ok(())
}

macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("prometheus sink not installed; call prometheus_sink::install() first")
    };
}

impl AdmissionMetricsSink for PrometheusSink {
    fn inc_accepted(&self) {
        get_metric!(COMMANDS_ACCEPTED_TOTAL)
            .with_label_values(&["accepted"])
            .inc();
    }
    fn inc_rejected(&self, reason: &'static str) {
        get_metric!(COMMANDS_REJECTED_TOTAL)
            .with_label_values(&[reason])
            .inc();
    }
    fn inc_autonomous_decision(&self, decision: &'static str) {
        get_metric!(AUTONOMOUS_DECISIONS_TOTAL)
            .with_label_values(&[decision])
            .inc();
    }
    fn observe_admission_latency(&self, duration_secs: f64) {
        get_metric!(ADMISSION_LATENCY_SECONDS)
            .with_label_values(&["admitted"])
            .observe(duration_secs);
    }
}

impl ExecutorMetricsSink for PrometheusSink {
    fn inc_executed(&self, action_type: &'static str) {
        get_metric!(EXECUTIONS_TOTAL)
            .with_label_values(&[action_type])
            .inc();
    }
    fn inc_rolled_back(&self, action_type: &'static str, reason: &'static str) {
        get_metric!(ROLLBACKS_TOTAL)
            .with_label_values(&[action_type, reason])
            .inc();
    }
    fn observe_execution_duration(&self, action_type: &'static str, duration_secs: f64) {
        get_metric!(EXECUTION_DURATION_SECONDS)
            .with_label_values(&[action_type])
            .observe(duration_secs);
    }
}

impl AuditMetricsSink for PrometheusSink {
    fn set_sequence(&self, sequence: u64) {
        get_metric!(AUDIT_SEQUENCE).set(sequence as f64);
    }
    fn inc_segment_rotations(&self) {
        get_metric!(AUDIT_SEGMENT_ROTATIONS_TOTAL)
            .with_label_values(&["rotation"])
            .inc();
    }
    fn inc_write_failures(&self) {
        get_metric!(AUDIT_WRITE_FAILURES_TOTAL)
            .with_label_values(&["failure"])
            .inc();
    }
}

pub static PROMETHEUS_SINK: PrometheusSink = PrometheusSink;
