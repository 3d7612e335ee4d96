#![deny(unsafe_code)]
#![warn(missing_docs)]
//! scheduler-core
//!
//! The stable contract for the scheduler decision engine: the request and
//! decision data model, the activation algebra, the declarative pipeline
//! configuration shape, and the error taxonomy every other crate in this
//! workspace builds on.
//!
//! If you only take one dependency from this workspace, take this one.

/// Scalar activation algebra (`no_effect`, `norm`, `apply`).
pub mod activation;
/// Declarative pipeline configuration and knowledge readiness.
pub mod config;
/// Decision output record.
pub mod decision;
/// Comprehensive error catalog for the scheduler engine.
pub mod error;
/// Placement request contract.
pub mod request;
/// Per-step result shape.
pub mod step_result;
/// Post-hoc invariant checks shared by the validation wrapper.
pub mod validate;

pub use activation::{apply, no_effect, norm};
pub use config::{
    DisabledValidations, KnowledgeRef, PipelineConfig, PipelineType, SchedulingDomain, StepConfig,
};
pub use decision::{Decision, DecisionStatus, StepResultEntry};
pub use error::{ErrorCode, SchedulerError};
pub use request::Request;
pub use step_result::{StepResult, StepStatistics};
pub use validate::InvariantViolation;

/// Current contract version string embedded in telemetry events and status
/// conditions.
pub const CONTRACT_VERSION: &str = "scheduler/v1";
