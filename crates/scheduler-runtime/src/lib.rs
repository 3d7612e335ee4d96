#![deny(unsafe_code)]
#![warn(missing_docs)]
//! scheduler-runtime
//!
//! The pipeline executor: step trait, monitor/validation decorators, step
//! registry, telemetry, decision event bus, and cooperative cancellation.
//! Builds a [`pipeline::Pipeline`] from a
//! [`scheduler_core::PipelineConfig`] and runs it against
//! [`scheduler_core::Request`]s.

/// Decision event bus.
pub mod bus;
/// Cooperative cancellation tokens.
pub mod cancel;
/// Transparent per-step monitoring wrapper.
pub mod monitor;
/// Prometheus text-exposition rendering.
pub mod metrics_text;
/// Pipeline construction and execution.
pub mod pipeline;
/// Step factory registry.
pub mod registry;
/// Top-K reordering and per-statistic impact measurement.
pub mod reorder;
/// The step interface every filter, weigher, and detector implements.
pub mod step;
/// Pipeline-wide run metrics.
pub mod telemetry;
/// Invariant-checking decorator.
pub mod wrappers;

pub use bus::{DecisionEvent, EventBus, EventBusStats, EventSubscription};
pub use cancel::{CancellationReason, CancellationToken};
pub use monitor::{MonitorStep, StepMetrics, StepMetricsSnapshot, ACTIVATION_WINDOW_CAPACITY};
pub use metrics_text::render_pipeline_metrics;
pub use pipeline::{DroppedStep, Pipeline};
pub use registry::{StepFactory, StepRegistry};
pub use reorder::{Shift, TOP_K};
pub use step::{SchedulingStep, StepRunError};
pub use telemetry::{MetricsSnapshot, RunMetrics};
pub use wrappers::{StepRole, ValidationStep};
