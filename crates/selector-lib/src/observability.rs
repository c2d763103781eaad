//! Observability for the selector
//!
//! Provides:
//! - Prometheus metrics (round latency, probe latency and failures, selections, scores)
//! - Structured JSON logging with tracing

use crate::error::ProbeError;
use crate::models::{RoundRecord, ServerId};
use prometheus::{
    register_gauge_vec, register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, register_int_gauge, GaugeVec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 0.6, 1.0, 2.5,
];

static GLOBAL_METRICS: OnceLock<SelectorMetricsInner> = OnceLock::new();

struct SelectorMetricsInner {
    round_latency_seconds: Histogram,
    probe_latency_seconds: HistogramVec,
    rounds_completed: IntCounter,
    probe_failures: IntCounterVec,
    selections: IntCounterVec,
    anomalies_detected: IntCounter,
    server_score: GaugeVec,
    viable_servers: IntGauge,
}

impl SelectorMetricsInner {
    fn new() -> Self {
        Self {
            round_latency_seconds: register_histogram!(
                "server_selector_round_latency_seconds",
                "Wall-clock duration of one decision round",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register round_latency_seconds"),

            probe_latency_seconds: register_histogram_vec!(
                "server_selector_probe_latency_seconds",
                "Round-trip time of successful probes",
                &["server"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register probe_latency_seconds"),

            rounds_completed: register_int_counter!(
                "server_selector_rounds_completed_total",
                "Total number of completed decision rounds"
            )
            .expect("Failed to register rounds_completed"),

            probe_failures: register_int_counter_vec!(
                "server_selector_probe_failures_total",
                "Probes that produced no sample",
                &["server", "reason"]
            )
            .expect("Failed to register probe_failures"),

            selections: register_int_counter_vec!(
                "server_selector_selections_total",
                "Number of times each server was chosen",
                &["server", "branch"]
            )
            .expect("Failed to register selections"),

            anomalies_detected: register_int_counter!(
                "server_selector_anomalies_detected_total",
                "Servers flagged with an RTT anomaly"
            )
            .expect("Failed to register anomalies_detected"),

            server_score: register_gauge_vec!(
                "server_selector_server_score",
                "Current cost per server (only finite scores are exported)",
                &["server"]
            )
            .expect("Failed to register server_score"),

            viable_servers: register_int_gauge!(
                "server_selector_viable_servers",
                "Servers with a finite score in the last round"
            )
            .expect("Failed to register viable_servers"),
        }
    }
}

/// Handle to the process-wide selector metrics
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct SelectorMetrics {
    _private: (),
}

impl Default for SelectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SelectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SelectorMetricsInner {
        GLOBAL_METRICS.get_or_init(SelectorMetricsInner::new)
    }

    /// Snapshot of every registered metric family
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.inner();
        prometheus::gather()
    }

    pub fn observe_probe_latency(&self, server: &ServerId, duration_secs: f64) {
        self.inner()
            .probe_latency_seconds
            .with_label_values(&[server.as_str()])
            .observe(duration_secs);
    }

    pub fn inc_probe_failure(&self, server: &ServerId, error: &ProbeError) {
        self.inner()
            .probe_failures
            .with_label_values(&[server.as_str(), error.reason()])
            .inc();
    }

    /// Fold a completed round into the metrics
    pub fn record_round(&self, record: &RoundRecord) {
        let inner = self.inner();
        inner
            .round_latency_seconds
            .observe(record.duration_ms as f64 / 1000.0);
        inner.rounds_completed.inc();
        inner
            .selections
            .with_label_values(&[record.chosen.as_str(), record.branch.as_str()])
            .inc();

        let mut viable = 0;
        for server in &record.servers {
            if server.forecast.anomaly {
                inner.anomalies_detected.inc();
            }
            let label = [server.server.as_str()];
            if server.score.is_finite() {
                inner.server_score.with_label_values(&label).set(server.score);
                viable += 1;
            } else {
                // Missing series rather than +Inf for unscorable servers
                let _ = inner.server_score.remove_label_values(&label);
            }
        }
        inner.viable_servers.set(viable);
    }
}

/// Structured logger for selector events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, servers: usize) {
        info!(
            event = "selector_started",
            instance = %self.instance,
            version = %version,
            servers = servers,
            "Server selector started"
        );
    }

    pub fn log_shutdown(&self, reason: &str, rounds: u64) {
        info!(
            event = "selector_shutdown",
            instance = %self.instance,
            reason = %reason,
            rounds = rounds,
            "Server selector shutting down"
        );
    }

    pub fn log_probe_failure(&self, server: &ServerId, error: &ProbeError) {
        debug!(
            event = "probe_failed",
            instance = %self.instance,
            server = %server,
            reason = error.reason(),
            error = %error,
            "Probe produced no sample"
        );
    }

    /// Log a completed round plus any anomalies and a missing viable choice
    pub fn log_round(&self, record: &RoundRecord) {
        for server in record.servers.iter().filter(|s| s.forecast.anomaly) {
            info!(
                event = "anomaly_detected",
                instance = %self.instance,
                round = record.round,
                server = %server.server,
                predicted_rtt = ?server.forecast.rtt,
                "RTT anomaly detected"
            );
        }

        if !record.viable {
            warn!(
                event = "no_viable_server",
                instance = %self.instance,
                round = record.round,
                fallback = %record.chosen,
                "No server could be scored, using first in order"
            );
        }

        info!(
            event = "round_completed",
            instance = %self.instance,
            round = record.round,
            chosen = %record.chosen,
            branch = record.branch.as_str(),
            reachable = record.reachable_count(),
            servers = record.servers.len(),
            duration_ms = record.duration_ms,
            "Round completed"
        );
    }
}
