// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pipeline construction and execution.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use scheduler_core::{
    apply, norm, Decision, ErrorCode, PipelineConfig, PipelineType, Request, SchedulerError,
    StepConfig, StepResultEntry,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::{DecisionEvent, EventBus};
use crate::cancel::CancellationToken;
use crate::monitor::{MonitorStep, StepMetrics, StepMetricsSnapshot};
use crate::registry::StepRegistry;
use crate::step::{SchedulingStep, StepRunError};
use crate::telemetry::RunMetrics;
use crate::wrappers::{StepRole, ValidationStep};

/// One constructed, wrapped, initialized step ready to run, plus the
/// configuration values the executor needs at run time.
struct BoundStep {
    name: String,
    multiplier: f64,
    metrics: StepMetrics,
    instance: Arc<dyn SchedulingStep>,
}

/// A weigher or detector whose `Init` failed at construction time and was
/// therefore dropped from the pipeline instead of failing the whole build.
#[derive(Debug, Clone)]
pub struct DroppedStep {
    /// The step's configured name.
    pub step_name: String,
    /// Human-readable reason `Init` failed.
    pub reason: String,
    /// `true` if the failure was specifically an unregistered `impl` name,
    /// distinguished so the controller can report `AllStepsIndexed`
    /// separately from `AllStepsReady`.
    pub unknown_impl: bool,
}

/// A fully constructed, ready-to-run pipeline.
///
/// Built once per [`PipelineConfig`] generation by [`Pipeline::build`] and
/// then reused across many [`Pipeline::run`] calls; steps are `Send +
/// Sync` so concurrent requests against the same pipeline are safe.
pub struct Pipeline {
    name: String,
    filters: Vec<BoundStep>,
    weighers: Vec<BoundStep>,
    dropped: Vec<DroppedStep>,
    metrics: RunMetrics,
    events: Option<Arc<EventBus>>,
}

impl Pipeline {
    /// Construct and initialize every step in `config`, wiring each
    /// through `validate(monitor(impl))`.
    ///
    /// Filter `Init` failures are critical: the whole pipeline is
    /// rejected and [`ErrorCode::CriticalFilterInitFailed`] is returned,
    /// since a filter-weigher pipeline with a broken filter could admit
    /// hosts no downstream step expects. A weigher `Init` failure is
    /// non-critical: that weigher is dropped from the pipeline and a
    /// warning is logged, since a missing score contribution degrades
    /// ranking quality but never admits an invalid host.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.pipeline_type` is not
    /// [`PipelineType::FilterWeigher`], if a configured `impl` is not
    /// registered in `registry`, or if a filter's `Init` fails.
    pub async fn build(
        config: &PipelineConfig,
        registry: &StepRegistry,
        events: Option<Arc<EventBus>>,
    ) -> Result<Self, SchedulerError> {
        if config.pipeline_type != PipelineType::FilterWeigher {
            return Err(SchedulerError::pipeline(
                ErrorCode::PipelineConfigInvalid,
                &config.name,
                "only FilterWeigher pipelines can be executed by this runtime",
            ));
        }

        let mut filters = Vec::with_capacity(config.filters.len());
        for step_config in &config.filters {
            let bound = Self::bind_step(step_config, registry, StepRole::Filter, &config.name).await;
            match bound {
                Ok(bound) => filters.push(bound),
                Err(err) => {
                    return Err(SchedulerError::pipeline(
                        ErrorCode::CriticalFilterInitFailed,
                        &config.name,
                        format!("filter '{}' failed to initialize: {err}", step_config.name),
                    ))
                }
            }
        }

        let mut weighers = Vec::with_capacity(config.weighers.len());
        let mut dropped = Vec::new();
        for step_config in &config.weighers {
            match Self::bind_step(step_config, registry, StepRole::Weigher, &config.name).await {
                Ok(bound) => weighers.push(bound),
                Err(err) => {
                    warn!(
                        target: "scheduler.pipeline",
                        pipeline = %config.name,
                        weigher = %step_config.name,
                        error = %err,
                        "dropping weigher that failed to initialize",
                    );
                    dropped.push(DroppedStep {
                        step_name: step_config.name.clone(),
                        reason: err.to_string(),
                        unknown_impl: err.code() == ErrorCode::UnknownStepImpl,
                    });
                }
            }
        }

        Ok(Self {
            name: config.name.clone(),
            filters,
            weighers,
            dropped,
            metrics: RunMetrics::new(),
            events,
        })
    }

    /// Weighers that were dropped at construction time because their
    /// `Init` failed. Non-empty only when the pipeline is serving with a
    /// reduced step set.
    #[must_use]
    pub fn dropped_steps(&self) -> &[DroppedStep] {
        &self.dropped
    }

    async fn bind_step(
        step_config: &StepConfig,
        registry: &StepRegistry,
        role: StepRole,
        pipeline_name: &str,
    ) -> Result<BoundStep, SchedulerError> {
        let mut instance = registry.build(&step_config.step_impl)?;
        instance.init(step_config.params.clone()).await?;
        let metrics = StepMetrics::new();
        let monitored = Box::new(MonitorStep::new(instance, metrics.clone(), pipeline_name));
        let validated = ValidationStep::new(monitored, role, step_config.disabled_validations);
        Ok(BoundStep {
            name: step_config.name.clone(),
            multiplier: step_config.multiplier_or_default(),
            metrics,
            instance: Arc::new(validated),
        })
    }

    /// The pipeline's configured name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current run metrics for this pipeline instance.
    #[must_use]
    pub fn metrics(&self) -> crate::telemetry::MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Per-step metrics for every filter and weigher, in configured
    /// order.
    #[must_use]
    pub fn step_metrics(&self) -> Vec<StepMetricsSnapshot> {
        self.filters
            .iter()
            .chain(self.weighers.iter())
            .map(|bound| bound.metrics.snapshot(&bound.name))
            .collect()
    }

    /// Execute the pipeline once against `request`: run filters
    /// sequentially (each narrowing the candidate set), then weighers
    /// concurrently, then aggregate and sort.
    ///
    /// Checks `cancellation` between stages; if it fires mid-run the
    /// executor stops as soon as the in-flight stage completes and
    /// returns [`ErrorCode::StepTimedOut`].
    ///
    /// # Errors
    ///
    /// Returns an error if a filter fails (as opposed to skipping) or if
    /// `cancellation` fires before the run completes.
    pub async fn run(
        &self,
        request: &Request,
        cancellation: &CancellationToken,
    ) -> Result<Decision, SchedulerError> {
        let start = Instant::now();
        let result = self.run_inner(request, cancellation).await;
        let elapsed_micros = start.elapsed().as_micros() as u64;

        match &result {
            Ok(decision) => {
                self.metrics.record_run_with_host_counts(
                    elapsed_micros,
                    decision.ordered_hosts.is_empty(),
                    false,
                    Some(request.deduplicated_subjects().len() as u64),
                    Some(decision.ordered_hosts.len() as u64),
                );
                if let Some(bus) = &self.events {
                    bus.publish(DecisionEvent {
                        pipeline_name: self.name.clone(),
                        decision: decision.clone(),
                    });
                }
            }
            Err(_) => self.metrics.record_run(elapsed_micros, false, true),
        }

        result
    }

    async fn run_inner(
        &self,
        request: &Request,
        cancellation: &CancellationToken,
    ) -> Result<Decision, SchedulerError> {
        let normalized_in_weights: BTreeMap<String, f64> =
            request.weights.iter().map(|(k, v)| (k.clone(), norm(*v))).collect();

        let mut current = request.clone();
        let mut step_results = Vec::with_capacity(self.filters.len() + self.weighers.len());

        for bound in &self.filters {
            if cancellation.is_cancelled() {
                return Err(SchedulerError::internal(
                    ErrorCode::StepTimedOut,
                    "cancelled before all filters ran",
                ));
            }
            match bound.instance.run(&current).await {
                Ok(step_result) => {
                    current = current.filter_subjects(&step_result.activations);
                    debug!(
                        target: "scheduler.pipeline",
                        pipeline = %self.name,
                        filter = %bound.name,
                        remaining = current.subjects.len(),
                        "filter ran",
                    );
                    step_results.push(StepResultEntry {
                        step_name: bound.name.clone(),
                        result: Some(step_result),
                    });
                }
                Err(StepRunError::Skipped) => {
                    step_results.push(StepResultEntry {
                        step_name: bound.name.clone(),
                        result: None,
                    });
                }
                Err(StepRunError::Failed(err)) => return Err(err),
            }
        }

        if cancellation.is_cancelled() {
            return Err(SchedulerError::internal(
                ErrorCode::StepTimedOut,
                "cancelled before weighers ran",
            ));
        }

        let weigher_outcomes = self.run_weighers_concurrently(&current).await?;

        let mut aggregated = normalized_in_weights
            .iter()
            .filter(|(subject, _)| current.weights.contains_key(*subject))
            .map(|(s, w)| (s.clone(), *w))
            .collect::<BTreeMap<_, _>>();

        for (bound, outcome) in self.weighers.iter().zip(weigher_outcomes) {
            match outcome {
                Ok(step_result) => {
                    aggregated = apply(&aggregated, &step_result.activations, bound.multiplier);
                    step_results.push(StepResultEntry {
                        step_name: bound.name.clone(),
                        result: Some(step_result),
                    });
                }
                Err(StepRunError::Skipped) => {
                    step_results.push(StepResultEntry {
                        step_name: bound.name.clone(),
                        result: None,
                    });
                }
                Err(StepRunError::Failed(err)) => {
                    warn!(
                        target: "scheduler.pipeline",
                        pipeline = %self.name,
                        weigher = %bound.name,
                        error = %err,
                        "weigher failed; excluding its contribution from this decision",
                    );
                }
            }
        }

        // Stable sort on descending score keeps original subject order
        // (and therefore the upstream scheduler's own preference order)
        // as the tie-break, rather than an arbitrary hash order.
        let mut ordered: Vec<String> = current
            .deduplicated_subjects()
            .into_iter()
            .filter(|s| aggregated.contains_key(s))
            .collect();
        ordered.sort_by(|a, b| {
            aggregated[b]
                .partial_cmp(&aggregated[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        info!(
            target: "scheduler.pipeline",
            pipeline = %self.name,
            survivors = ordered.len(),
            "run complete",
        );

        Ok(Decision::new(
            request.weights.clone(),
            normalized_in_weights,
            aggregated,
            ordered,
            step_results,
        ))
    }

    /// Run every weigher concurrently against the same narrowed request,
    /// preserving configured order in the returned vector so aggregation
    /// stays deterministic regardless of completion order.
    async fn run_weighers_concurrently(
        &self,
        request: &Request,
    ) -> Result<Vec<Result<scheduler_core::StepResult, StepRunError>>, SchedulerError> {
        if self.weighers.is_empty() {
            return Ok(Vec::new());
        }

        let (tx, mut rx) = mpsc::channel(self.weighers.len());

        for (index, bound) in self.weighers.iter().enumerate() {
            let tx = tx.clone();
            let request = request.clone();
            let instance = Arc::clone(&bound.instance);
            tokio::spawn(async move {
                let outcome = instance.run(&request).await;
                let _ = tx.send((index, outcome)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<Result<scheduler_core::StepResult, StepRunError>>> =
            (0..self.weighers.len()).map(|_| None).collect();
        let mut received = 0;
        while let Some((index, outcome)) = rx.recv().await {
            slots[index] = Some(outcome);
            received += 1;
            if received == self.weighers.len() {
                break;
            }
        }

        if received != self.weighers.len() {
            return Err(SchedulerError::internal(
                ErrorCode::ChannelClosed,
                "weigher result channel closed before all results were collected",
            ));
        }

        Ok(slots.into_iter().map(|o| o.unwrap()).collect())
    }
}
