// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pipeline-wide run metrics, exposed in Prometheus-shaped naming.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable metric name for total pipeline runs.
pub const METRIC_RUNS_TOTAL: &str = "scheduler_pipeline_runs_total";
/// Stable metric name for runs that ended with an empty host list.
pub const METRIC_RUNS_EMPTY_TOTAL: &str = "scheduler_pipeline_runs_empty_total";
/// Stable metric name for runs that failed outright (not merely empty).
pub const METRIC_RUNS_FAILED_TOTAL: &str = "scheduler_pipeline_runs_failed_total";
/// Stable metric name for cumulative run duration.
pub const METRIC_RUN_DURATION_MICROS_TOTAL: &str = "scheduler_pipeline_run_duration_micros_total";

/// A point-in-time render of [`RunMetrics`], suitable for a `/metrics`
/// scrape or a structured log field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    /// Total completed runs, successful or not.
    pub runs_total: u64,
    /// Runs that completed with zero surviving hosts.
    pub runs_empty_total: u64,
    /// Runs that failed before producing a decision.
    pub runs_failed_total: u64,
    /// Cumulative wall-clock time across all runs, in microseconds.
    pub run_duration_micros_total: u64,
    /// `run_duration_micros_total / runs_total`, or `0.0` if no run has
    /// completed.
    pub mean_run_duration_micros: f64,
    /// `|request.subjects|` (deduplicated) on the most recent run —
    /// the data behind `pipeline_host_number_in{pipeline}`.
    pub last_host_number_in: u64,
    /// `|decision.ordered_hosts|` on the most recent run — the data
    /// behind `pipeline_host_number_out{pipeline}`.
    pub last_host_number_out: u64,
}

#[derive(Default)]
struct Inner {
    runs_total: AtomicU64,
    runs_empty_total: AtomicU64,
    runs_failed_total: AtomicU64,
    run_duration_micros_total: AtomicU64,
    last_host_number_in: AtomicU64,
    last_host_number_out: AtomicU64,
}

/// Shared, cheaply-cloneable accumulator for one pipeline instance's run
/// metrics.
#[derive(Clone, Default)]
pub struct RunMetrics(Arc<Inner>);

impl RunMetrics {
    /// A fresh, zeroed accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one completed run.
    pub fn record_run(&self, duration_micros: u64, empty: bool, failed: bool) {
        self.record_run_with_host_counts(duration_micros, empty, failed, None, None);
    }

    /// Record the outcome of one completed run, additionally recording
    /// the subject counts in/out for the `pipeline_host_number_{in,out}`
    /// gauges. `None` leaves the prior gauge value untouched — used when
    /// a run aborted before a host count was ever known.
    pub fn record_run_with_host_counts(
        &self,
        duration_micros: u64,
        empty: bool,
        failed: bool,
        host_number_in: Option<u64>,
        host_number_out: Option<u64>,
    ) {
        self.0.runs_total.fetch_add(1, Ordering::Relaxed);
        self.0
            .run_duration_micros_total
            .fetch_add(duration_micros, Ordering::Relaxed);
        if empty {
            self.0.runs_empty_total.fetch_add(1, Ordering::Relaxed);
        }
        if failed {
            self.0.runs_failed_total.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(n) = host_number_in {
            self.0.last_host_number_in.store(n, Ordering::Relaxed);
        }
        if let Some(n) = host_number_out {
            self.0.last_host_number_out.store(n, Ordering::Relaxed);
        }
    }

    /// Render the current counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let runs_total = self.0.runs_total.load(Ordering::Relaxed);
        let run_duration_micros_total = self.0.run_duration_micros_total.load(Ordering::Relaxed);
        let mean_run_duration_micros = if runs_total == 0 {
            0.0
        } else {
            run_duration_micros_total as f64 / runs_total as f64
        };
        MetricsSnapshot {
            runs_total,
            runs_empty_total: self.0.runs_empty_total.load(Ordering::Relaxed),
            runs_failed_total: self.0.runs_failed_total.load(Ordering::Relaxed),
            run_duration_micros_total,
            mean_run_duration_micros,
            last_host_number_in: self.0.last_host_number_in.load(Ordering::Relaxed),
            last_host_number_out: self.0.last_host_number_out.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_starts_zeroed() {
        let metrics = RunMetrics::new();
        let s = metrics.snapshot();
        assert_eq!(s.runs_total, 0);
        assert_eq!(s.mean_run_duration_micros, 0.0);
    }

    #[test]
    fn record_run_accumulates_counters_and_mean() {
        let metrics = RunMetrics::new();
        metrics.record_run(100, false, false);
        metrics.record_run(300, true, false);
        let s = metrics.snapshot();
        assert_eq!(s.runs_total, 2);
        assert_eq!(s.runs_empty_total, 1);
        assert_eq!(s.runs_failed_total, 0);
        assert_eq!(s.run_duration_micros_total, 400);
        assert_eq!(s.mean_run_duration_micros, 200.0);
    }
}
