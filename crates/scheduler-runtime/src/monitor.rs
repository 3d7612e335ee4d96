// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transparent monitoring wrapper around a [`SchedulingStep`].
//!
//! Records invocation counts, failure/skip counts, timing, a bounded
//! sliding window of per-subject signed activation deltas, removed-host
//! counts, top-K reordering origins, and per-statistic impact — then
//! always returns the wrapped step's result verbatim ("pure observation").
//!
//! The per-`(subject, step)` activation window is capped at
//! [`ACTIVATION_WINDOW_CAPACITY`] samples: oldest samples are evicted
//! rather than accumulated for the process lifetime.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use scheduler_core::{Request, SchedulerError, StepResult};
use tracing::debug;

use crate::reorder::{self, Shift};
use crate::step::{SchedulingStep, StepRunError};

/// Maximum number of recent per-subject activation samples retained for
/// the sliding-window weight-modification metric.
pub const ACTIVATION_WINDOW_CAPACITY: usize = 64;

/// Point-in-time snapshot of a step's accumulated metrics, suitable for
/// rendering as a Prometheus exposition line or a trace-log field.
#[derive(Debug, Clone, PartialEq)]
pub struct StepMetricsSnapshot {
    /// The step's configured name.
    pub step_name: String,
    /// Total number of `run` invocations observed.
    pub invocations: u64,
    /// Number of invocations that returned [`StepRunError::Skipped`].
    pub skips: u64,
    /// Number of invocations that returned a hard failure.
    pub failures: u64,
    /// Total wall-clock time spent in `run`, across all invocations.
    pub total_duration_micros: u64,
    /// Mean of `total_duration_micros / invocations`, or `0.0` if no
    /// invocation has completed yet.
    pub mean_duration_micros: f64,
    /// Mean absolute activation value over the last
    /// [`ACTIVATION_WINDOW_CAPACITY`] successful runs.
    pub recent_mean_abs_activation: f64,
    /// Number of subjects this step removed on its most recent run
    /// (`|request.subjects| - |activations|`).
    pub last_removed_hosts: usize,
    /// Cumulative removed-host count across all runs.
    pub removed_hosts_total: u64,
    /// Top-K reordering origins from the most recent run, in output-index
    /// order (`pipeline_step_shift_origin{outidx}`).
    pub last_shifts: Vec<Shift>,
    /// Per-statistic impact score from the most recent run
    /// (`pipeline_step_impact{stat,unit}`), keyed by statistic name to
    /// `(value, unit)`.
    pub last_impact: BTreeMap<String, (f64, String)>,
    /// Mean activation magnitude per subject over its retained window —
    /// the data behind `pipeline_step_weight_modification{host}`.
    pub weight_modifications: BTreeMap<String, f64>,
}

#[derive(Default)]
struct StepMetricsInner {
    invocations: AtomicU64,
    skips: AtomicU64,
    failures: AtomicU64,
    total_duration_micros: AtomicU64,
    removed_hosts_total: AtomicU64,
    recent_mean_abs_activation: Mutex<VecDeque<f64>>,
    per_subject_activation: Mutex<BTreeMap<String, VecDeque<f64>>>,
    last_removed_hosts: Mutex<usize>,
    last_shifts: Mutex<Vec<Shift>>,
    last_impact: Mutex<BTreeMap<String, (f64, String)>>,
}

/// Shared, cheaply-cloneable handle to one step's accumulated metrics.
#[derive(Clone, Default)]
pub struct StepMetrics(Arc<StepMetricsInner>);

impl StepMetrics {
    /// A fresh, zeroed metrics handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    fn record_success(
        &self,
        elapsed_micros: u64,
        mean_abs_activation: f64,
        per_subject: BTreeMap<String, f64>,
        removed_hosts: usize,
        shifts: Vec<Shift>,
        impact: BTreeMap<String, (f64, String)>,
    ) {
        self.0.invocations.fetch_add(1, Ordering::Relaxed);
        self.0
            .total_duration_micros
            .fetch_add(elapsed_micros, Ordering::Relaxed);
        self.0
            .removed_hosts_total
            .fetch_add(removed_hosts as u64, Ordering::Relaxed);

        let mut window = self.0.recent_mean_abs_activation.lock().unwrap();
        if window.len() == ACTIVATION_WINDOW_CAPACITY {
            window.pop_front();
        }
        window.push_back(mean_abs_activation);
        drop(window);

        let mut per_subject_windows = self.0.per_subject_activation.lock().unwrap();
        for (subject, value) in per_subject {
            let subject_window = per_subject_windows.entry(subject).or_default();
            if subject_window.len() == ACTIVATION_WINDOW_CAPACITY {
                subject_window.pop_front();
            }
            subject_window.push_back(value);
        }
        drop(per_subject_windows);

        *self.0.last_removed_hosts.lock().unwrap() = removed_hosts;
        *self.0.last_shifts.lock().unwrap() = shifts;
        *self.0.last_impact.lock().unwrap() = impact;
    }

    fn record_skip(&self, elapsed_micros: u64) {
        self.0.invocations.fetch_add(1, Ordering::Relaxed);
        self.0.skips.fetch_add(1, Ordering::Relaxed);
        self.0
            .total_duration_micros
            .fetch_add(elapsed_micros, Ordering::Relaxed);
    }

    fn record_failure(&self, elapsed_micros: u64) {
        self.0.invocations.fetch_add(1, Ordering::Relaxed);
        self.0.failures.fetch_add(1, Ordering::Relaxed);
        self.0
            .total_duration_micros
            .fetch_add(elapsed_micros, Ordering::Relaxed);
    }

    /// Render the current counters as a snapshot.
    #[must_use]
    pub fn snapshot(&self, step_name: &str) -> StepMetricsSnapshot {
        let invocations = self.0.invocations.load(Ordering::Relaxed);
        let total_duration_micros = self.0.total_duration_micros.load(Ordering::Relaxed);
        let mean_duration_micros = if invocations == 0 {
            0.0
        } else {
            total_duration_micros as f64 / invocations as f64
        };
        let window = self.0.recent_mean_abs_activation.lock().unwrap();
        let recent_mean_abs_activation = if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<f64>() / window.len() as f64
        };
        drop(window);
        StepMetricsSnapshot {
            step_name: step_name.to_string(),
            invocations,
            skips: self.0.skips.load(Ordering::Relaxed),
            failures: self.0.failures.load(Ordering::Relaxed),
            total_duration_micros,
            mean_duration_micros,
            recent_mean_abs_activation,
            last_removed_hosts: *self.0.last_removed_hosts.lock().unwrap(),
            removed_hosts_total: self.0.removed_hosts_total.load(Ordering::Relaxed),
            last_shifts: self.0.last_shifts.lock().unwrap().clone(),
            last_impact: self.0.last_impact.lock().unwrap().clone(),
            weight_modifications: self.recent_weight_modifications(),
        }
    }

    /// Mean activation magnitude per subject over its retained window —
    /// the data behind `pipeline_step_weight_modification{host}`.
    #[must_use]
    pub fn recent_weight_modifications(&self) -> BTreeMap<String, f64> {
        self.0
            .per_subject_activation
            .lock()
            .unwrap()
            .iter()
            .map(|(subject, window)| {
                let mean = window.iter().sum::<f64>() / window.len().max(1) as f64;
                (subject.clone(), mean)
            })
            .collect()
    }
}

fn mean_abs_activation(result: &StepResult) -> f64 {
    if result.activations.is_empty() {
        return 0.0;
    }
    let sum: f64 = result.activations.values().map(|v| v.abs()).sum();
    sum / result.activations.len() as f64
}

/// Wraps a [`SchedulingStep`], recording timing, reordering, and impact
/// metrics around every invocation without altering its behavior.
pub struct MonitorStep {
    inner: Box<dyn SchedulingStep>,
    metrics: StepMetrics,
    pipeline_name: String,
}

impl MonitorStep {
    /// Wrap `inner`, publishing metrics through `metrics`. `pipeline_name`
    /// tags the structured trace summary emitted after every run.
    #[must_use]
    pub fn new(inner: Box<dyn SchedulingStep>, metrics: StepMetrics, pipeline_name: impl Into<String>) -> Self {
        Self {
            inner,
            metrics,
            pipeline_name: pipeline_name.into(),
        }
    }

    /// Current metrics snapshot for the wrapped step.
    #[must_use]
    pub fn metrics_snapshot(&self) -> StepMetricsSnapshot {
        self.metrics.snapshot(self.inner.get_name())
    }
}

#[async_trait]
impl SchedulingStep for MonitorStep {
    async fn init(&mut self, params: serde_json::Value) -> Result<(), SchedulerError> {
        self.inner.init(params).await
    }

    fn get_name(&self) -> &str {
        self.inner.get_name()
    }

    async fn run(&self, request: &Request) -> Result<StepResult, StepRunError> {
        let start = Instant::now();
        let outcome = self.inner.run(request).await;
        let elapsed_micros = start.elapsed().as_micros() as u64;
        match &outcome {
            Ok(result) => {
                let removed_hosts = request.subjects.len().saturating_sub(result.activations.len());
                let before = reorder::input_order(&request.weights);
                let after = reorder::output_order(&request.weights, &result.activations);
                let shifts = reorder::top_shifts(&before, &after);

                let impact: BTreeMap<String, (f64, String)> = result
                    .statistics
                    .iter()
                    .map(|(stat_name, stat)| {
                        (
                            stat_name.clone(),
                            (reorder::impact(&before, &shifts, stat), stat.unit.clone()),
                        )
                    })
                    .collect();

                for (stat_name, stat) in &result.statistics {
                    debug!(
                        target: "scheduler.monitor",
                        pipeline = %self.pipeline_name,
                        step = %self.inner.get_name(),
                        "{}",
                        reorder::trace_summary(stat_name, &before, &after, stat),
                    );
                }

                self.metrics.record_success(
                    elapsed_micros,
                    mean_abs_activation(result),
                    result.activations.clone(),
                    removed_hosts,
                    shifts,
                    impact,
                );
            }
            Err(StepRunError::Skipped) => self.metrics.record_skip(elapsed_micros),
            Err(StepRunError::Failed(_)) => self.metrics.record_failure(elapsed_micros),
        }
        outcome
    }
}
