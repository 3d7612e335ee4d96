// SPDX-License-Identifier: MIT OR Apache-2.0
//! The trait every filter, weigher, and detector implementation satisfies.

use async_trait::async_trait;
use scheduler_core::{Request, SchedulerError, StepResult};

/// Outcome of a failed step invocation.
///
/// `Skipped` is not a failure: it means the step opted out of this
/// particular request, and the pipeline proceeds as if the step were
/// absent for this run.
#[derive(Debug, thiserror::Error)]
pub enum StepRunError {
    /// The step declined to participate in this request.
    #[error("step skipped")]
    Skipped,
    /// The step failed for a reason other than opting out.
    #[error(transparent)]
    Failed(#[from] SchedulerError),
}

/// A single pluggable unit of work inside a pipeline.
///
/// Implementations are constructed by a [`crate::registry::StepFactory`]
/// from a [`scheduler_core::StepConfig`], then `init` is called exactly
/// once before any `run`. The same instance may then be `run` many times
/// across many requests; implementations must be safe to call
/// concurrently from multiple requests (`Send + Sync`).
#[async_trait]
pub trait SchedulingStep: Send + Sync {
    /// Parse `params` and perform any one-time setup (e.g. resolving
    /// knowledge table handles). Called once, before the first `run`.
    async fn init(&mut self, params: serde_json::Value) -> Result<(), SchedulerError>;

    /// Stable name for logs and metrics. Typically the configured step
    /// name, not the impl name, so operators can distinguish two
    /// instances of the same impl in one pipeline.
    fn get_name(&self) -> &str;

    /// Evaluate this step against `request`, returning activations (and
    /// optional diagnostic statistics) or declining via
    /// [`StepRunError::Skipped`].
    async fn run(&self, request: &Request) -> Result<StepResult, StepRunError>;
}
