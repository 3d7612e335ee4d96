// SPDX-License-Identifier: MIT OR Apache-2.0
//! Validation decorator: `validate(monitor(impl))`.
//!
//! Composition order matters: the monitor wrapper sits closest to the raw
//! implementation so timing and outcome counts reflect the step's actual
//! work, while the validation wrapper sits outermost so a rejected run is
//! recorded as a failure in the step's own metrics too.

use async_trait::async_trait;
use scheduler_core::{validate, ErrorCode, Request, SchedulerError};

use crate::step::{SchedulingStep, StepRunError};

/// Which role a step plays in the pipeline, selecting which invariant set
/// [`ValidationStep`] enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRole {
    /// Enforces the filter invariant: output subjects are a subset of
    /// input subjects.
    Filter,
    /// Enforces the weigher invariants: activation-count parity and
    /// non-empty output, each individually disable-able.
    Weigher,
}

/// Wraps a [`SchedulingStep`], checking its output against the invariants
/// appropriate to its role and converting a violation into a
/// [`StepRunError::Failed`] carrying [`ErrorCode::StepInvariantViolation`].
pub struct ValidationStep {
    inner: Box<dyn SchedulingStep>,
    role: StepRole,
    disabled: scheduler_core::DisabledValidations,
}

impl ValidationStep {
    /// Wrap `inner`, enforcing the invariants for `role` except those
    /// relaxed by `disabled`.
    #[must_use]
    pub fn new(
        inner: Box<dyn SchedulingStep>,
        role: StepRole,
        disabled: scheduler_core::DisabledValidations,
    ) -> Self {
        Self {
            inner,
            role,
            disabled,
        }
    }
}

#[async_trait]
impl SchedulingStep for ValidationStep {
    async fn init(&mut self, params: serde_json::Value) -> Result<(), SchedulerError> {
        self.inner.init(params).await
    }

    fn get_name(&self) -> &str {
        self.inner.get_name()
    }

    async fn run(&self, request: &Request) -> Result<scheduler_core::StepResult, StepRunError> {
        let result = self.inner.run(request).await?;

        let violations = match self.role {
            StepRole::Filter => validate::check_filter_subset(&request.subjects, &result.activations),
            StepRole::Weigher => validate::check_weigher_invariants(
                &request.deduplicated_subjects(),
                &result.activations,
                self.disabled.same_subject_number_in_out,
                self.disabled.some_subjects_remain,
            ),
        };

        if violations.is_empty() {
            return Ok(result);
        }

        let message = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(StepRunError::Failed(SchedulerError::step(
            ErrorCode::StepInvariantViolation,
            self.inner.get_name(),
            message,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::StepResult;
    use std::collections::BTreeMap;

    struct FixedFilter(BTreeMap<String, f64>);

    #[async_trait]
    impl SchedulingStep for FixedFilter {
        async fn init(&mut self, _params: serde_json::Value) -> Result<(), SchedulerError> {
            Ok(())
        }
        fn get_name(&self) -> &str {
            "fixed-filter"
        }
        async fn run(&self, _request: &Request) -> Result<StepResult, StepRunError> {
            Ok(StepResult::with_activations(self.0.clone()))
        }
    }

    fn req() -> Request {
        Request::new(
            vec!["h1".to_string(), "h2".to_string()],
            BTreeMap::from([("h1".to_string(), 0.0), ("h2".to_string(), 0.0)]),
        )
    }

    #[tokio::test]
    async fn filter_validation_passes_when_output_is_subset() {
        let inner = Box::new(FixedFilter(BTreeMap::from([("h1".to_string(), 1.0)])));
        let wrapped = ValidationStep::new(inner, StepRole::Filter, Default::default());
        assert!(wrapped.run(&req()).await.is_ok());
    }

    #[tokio::test]
    async fn filter_validation_rejects_introduced_subject() {
        let inner = Box::new(FixedFilter(BTreeMap::from([("h9".to_string(), 1.0)])));
        let wrapped = ValidationStep::new(inner, StepRole::Filter, Default::default());
        let err = wrapped.run(&req()).await.unwrap_err();
        match err {
            StepRunError::Failed(e) => assert_eq!(e.code(), ErrorCode::StepInvariantViolation),
            StepRunError::Skipped => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn weigher_validation_rejects_count_mismatch_unless_disabled() {
        let inner = Box::new(FixedFilter(BTreeMap::from([("h1".to_string(), 1.0)])));
        let wrapped = ValidationStep::new(inner, StepRole::Weigher, Default::default());
        assert!(wrapped.run(&req()).await.is_err());

        let inner2 = Box::new(FixedFilter(BTreeMap::from([("h1".to_string(), 1.0)])));
        let disabled = scheduler_core::DisabledValidations {
            same_subject_number_in_out: true,
            some_subjects_remain: false,
        };
        let wrapped2 = ValidationStep::new(inner2, StepRole::Weigher, disabled);
        assert!(wrapped2.run(&req()).await.is_ok());
    }
}
