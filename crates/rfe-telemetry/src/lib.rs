// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluation counters and log setup for the REST fitness engine.
//!
//! [`EvaluationCounters`] tracks transport-level incidents (timeouts, dropped
//! connections, oversized bodies) across every evaluation that shares it.
//! [`MetricsCollector`] keeps one [`EvaluationMetrics`] record per evaluation
//! and aggregates them into a [`MetricsSummary`].
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// EvaluationCounters
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    evaluations: AtomicU64,
    discarded: AtomicU64,
    calls: AtomicU64,
    timeouts: AtomicU64,
    tcp_problems: AtomicU64,
    too_large_bodies: AtomicU64,
    connection_close_requests: AtomicU64,
    ephemeral_port_retries: AtomicU64,
}

/// Shared incident counters. Cloning shares the underlying counts.
#[derive(Debug, Clone, Default)]
pub struct EvaluationCounters {
    inner: Arc<Counters>,
}

/// Point-in-time copy of [`EvaluationCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Evaluations started.
    pub evaluations: u64,
    /// Evaluations that produced no fitness (tcp problem, missing coverage).
    pub discarded: u64,
    /// Calls sent.
    pub calls: u64,
    /// Calls that timed out.
    pub timeouts: u64,
    /// Calls whose connection was dropped.
    pub tcp_problems: u64,
    /// Responses whose body exceeded the size limit.
    pub too_large_bodies: u64,
    /// Responses asking to close the connection.
    pub connection_close_requests: u64,
    /// Retries after ephemeral port exhaustion.
    pub ephemeral_port_retries: u64,
}

impl EvaluationCounters {
    /// Fresh counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// An evaluation started.
    pub fn record_evaluation(&self) {
        Self::bump(&self.inner.evaluations);
    }

    /// An evaluation was thrown away.
    pub fn record_discarded(&self) {
        Self::bump(&self.inner.discarded);
    }

    /// A call was sent.
    pub fn record_call(&self) {
        Self::bump(&self.inner.calls);
    }

    /// A call timed out.
    pub fn record_timeout(&self, endpoint: &str) {
        let total = Self::bump(&self.inner.timeouts);
        debug!(target: "rfe.telemetry", endpoint, total, "call timed out");
    }

    /// A connection was dropped.
    pub fn record_tcp_problem(&self) {
        Self::bump(&self.inner.tcp_problems);
    }

    /// A response body was too large to keep.
    pub fn record_too_large_body(&self) {
        Self::bump(&self.inner.too_large_bodies);
    }

    /// A response carried `Connection: close`.
    pub fn record_connection_close(&self, status: Option<u16>) {
        let total = Self::bump(&self.inner.connection_close_requests);
        debug!(target: "rfe.telemetry", ?status, total, "server requested connection close");
    }

    /// The transport was recreated after ephemeral port exhaustion.
    pub fn record_ephemeral_port_retry(&self) {
        Self::bump(&self.inner.ephemeral_port_retries);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> CounterSnapshot {
        let c = &self.inner;
        CounterSnapshot {
            evaluations: c.evaluations.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            calls: c.calls.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            tcp_problems: c.tcp_problems.load(Ordering::Relaxed),
            too_large_bodies: c.too_large_bodies.load(Ordering::Relaxed),
            connection_close_requests: c.connection_close_requests.load(Ordering::Relaxed),
            ephemeral_port_retries: c.ephemeral_port_retries.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// EvaluationMetrics
// ---------------------------------------------------------------------------

/// Metrics captured for a single evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationMetrics {
    /// Sample type of the individual (`random`, `security`, ...).
    pub sample_type: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Calls executed.
    pub calls_executed: u64,
    /// Objectives touched.
    pub targets: u64,
    /// Objectives fully covered.
    pub covered_targets: u64,
    /// Faults attached to results.
    pub faults: u64,
    /// Whether the sequence stopped before its last call.
    pub stopped_early: bool,
}

/// Aggregated statistics across evaluations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    /// Number of evaluations recorded.
    pub count: usize,
    /// Mean duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Median (p50) duration in milliseconds.
    pub p50_duration_ms: f64,
    /// 99th-percentile duration in milliseconds.
    pub p99_duration_ms: f64,
    /// Total calls across all evaluations.
    pub total_calls: u64,
    /// Total faults across all evaluations.
    pub total_faults: u64,
    /// Fraction of evaluations that stopped early.
    pub early_stop_rate: f64,
    /// Evaluations per sample type (deterministic ordering).
    pub sample_type_counts: BTreeMap<String, usize>,
}

/// Compute a percentile value from a **sorted** slice.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

/// Thread-safe collector of [`EvaluationMetrics`].
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Vec<EvaluationMetrics>>>,
}

impl MetricsCollector {
    /// Create a new, empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a Vec half-pushed.
    fn data(&self) -> MutexGuard<'_, Vec<EvaluationMetrics>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a finished evaluation.
    pub fn record(&self, metrics: EvaluationMetrics) {
        info!(
            target: "rfe.telemetry",
            duration_ms = metrics.duration_ms,
            calls = metrics.calls_executed,
            covered = metrics.covered_targets,
            faults = metrics.faults,
            "evaluation finished"
        );
        self.data().push(metrics);
    }

    /// All recorded metrics.
    pub fn evaluations(&self) -> Vec<EvaluationMetrics> {
        self.data().clone()
    }

    /// Number of evaluations recorded so far.
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate everything recorded so far.
    pub fn summary(&self) -> MetricsSummary {
        let data = self.data();
        if data.is_empty() {
            return MetricsSummary::default();
        }

        let count = data.len();
        let mut durations: Vec<u64> = data.iter().map(|m| m.duration_ms).collect();
        durations.sort_unstable();
        let mean_duration_ms = durations.iter().sum::<u64>() as f64 / count as f64;

        let mut sample_type_counts: BTreeMap<String, usize> = BTreeMap::new();
        for m in data.iter() {
            *sample_type_counts.entry(m.sample_type.clone()).or_insert(0) += 1;
        }

        MetricsSummary {
            count,
            mean_duration_ms,
            p50_duration_ms: percentile(&durations, 50.0),
            p99_duration_ms: percentile(&durations, 99.0),
            total_calls: data.iter().map(|m| m.calls_executed).sum(),
            total_faults: data.iter().map(|m| m.faults).sum(),
            early_stop_rate: data.iter().filter(|m| m.stopped_early).count() as f64
                / count as f64,
            sample_type_counts,
        }
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        self.data().clear();
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Install a global `fmt` subscriber filtered by `filter` (an `EnvFilter`
/// directive such as `"rfe=debug"`).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(filter: &str) -> bool {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rfe=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
