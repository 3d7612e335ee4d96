// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed registry mapping a [`scheduler_core::StepConfig::step_impl`] name
//! to a constructor for the corresponding [`SchedulingStep`].
//!
//! Grounded on the same "name to typed handle" shape as a backend
//! registry, adapted here to hold factory closures instead of live
//! instances since steps are constructed lazily per pipeline build.

use std::collections::BTreeMap;
use std::sync::Arc;

use scheduler_core::{ErrorCode, SchedulerError};

use crate::step::SchedulingStep;

/// A constructor for one step impl. Takes no arguments: implementations
/// read their configuration during `init`, not construction, so the same
/// factory can be registered once and reused across many pipelines.
pub type StepFactory = Arc<dyn Fn() -> Box<dyn SchedulingStep> + Send + Sync>;

/// Maps registered `impl` names to their constructors.
///
/// Populated once at process startup (or test setup) with every step
/// implementation the binary links in, then consulted by the pipeline
/// builder while constructing a [`crate::pipeline::Pipeline`] from a
/// [`scheduler_core::PipelineConfig`].
#[derive(Clone, Default)]
pub struct StepRegistry {
    factories: BTreeMap<String, StepFactory>,
}

impl StepRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `impl_name`. A later call with the
    /// same name overwrites the earlier registration.
    pub fn register(&mut self, impl_name: impl Into<String>, factory: StepFactory) {
        self.factories.insert(impl_name.into(), factory);
    }

    /// List every registered impl name, in sorted order.
    #[must_use]
    pub fn registered_impls(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// `true` if `impl_name` has a registered constructor.
    #[must_use]
    pub fn contains(&self, impl_name: &str) -> bool {
        self.factories.contains_key(impl_name)
    }

    /// Construct a fresh, un-initialized instance of `impl_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::UnknownStepImpl`] if no constructor is
    /// registered under that name.
    pub fn build(&self, impl_name: &str) -> Result<Box<dyn SchedulingStep>, SchedulerError> {
        let factory = self.factories.get(impl_name).ok_or_else(|| {
            SchedulerError::step(
                ErrorCode::UnknownStepImpl,
                impl_name,
                format!("no step implementation registered under '{impl_name}'"),
            )
        })?;
        Ok(factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scheduler_core::{Request, StepResult};
    use crate::step::StepRunError;

    struct NoopStep;

    #[async_trait]
    impl SchedulingStep for NoopStep {
        async fn init(&mut self, _params: serde_json::Value) -> Result<(), SchedulerError> {
            Ok(())
        }
        fn get_name(&self) -> &str {
            "noop"
        }
        async fn run(&self, _request: &Request) -> Result<StepResult, StepRunError> {
            Ok(StepResult::empty())
        }
    }

    #[test]
    fn build_unknown_impl_returns_unknown_step_impl_error() {
        let registry = StepRegistry::new();
        let err = registry.build("does_not_exist").unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownStepImpl);
    }

    #[test]
    fn registered_impl_builds_successfully() {
        let mut registry = StepRegistry::new();
        registry.register("noop", Arc::new(|| Box::new(NoopStep) as Box<dyn SchedulingStep>));
        assert!(registry.contains("noop"));
        assert!(registry.build("noop").is_ok());
        assert_eq!(registry.registered_impls(), vec!["noop"]);
    }
}
