// SPDX-License-Identifier: MIT OR Apache-2.0
//! A single always-available step impl registered under `"noop"`, useful
//! for smoke-testing a freshly deployed pipeline before real filter and
//! weigher implementations are wired in by an operator's own registry
//! extension.

use async_trait::async_trait;
use scheduler_core::{Request, SchedulerError, StepResult};
use scheduler_runtime::{SchedulingStep, StepRunError};

/// Passes every subject through unchanged with activation `0`.
pub struct NoopStep {
    name: String,
}

impl NoopStep {
    /// A fresh, un-named instance; `init` sets the configured name.
    #[must_use]
    pub fn new() -> Self {
        Self { name: "noop".to_string() }
    }
}

impl Default for NoopStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulingStep for NoopStep {
    async fn init(&mut self, _params: serde_json::Value) -> Result<(), SchedulerError> {
        Ok(())
    }

    fn get_name(&self) -> &str {
        &self.name
    }

    async fn run(&self, request: &Request) -> Result<StepResult, StepRunError> {
        let activations = request.deduplicated_subjects().into_iter().map(|s| (s, 0.0)).collect();
        Ok(StepResult::with_activations(activations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn passes_every_subject_through_with_zero_activation() {
        let step = NoopStep::new();
        let request = Request::new(
            vec!["h1".to_string(), "h2".to_string()],
            BTreeMap::from([("h1".to_string(), 1.0), ("h2".to_string(), 2.0)]),
        );
        let result = step.run(&request).await.unwrap();
        assert_eq!(result.activations.len(), 2);
        assert_eq!(result.activations.get("h1"), Some(&0.0));
    }
}
