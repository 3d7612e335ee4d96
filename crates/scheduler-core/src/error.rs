// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(clippy::too_many_lines)]

//! Comprehensive error catalog for the scheduler decision engine.
//!
//! Every error code follows the pattern `SCH-X###` where `X` is the
//! category letter and `###` is a three-digit number:
//!
//! - **Q** — Request validation errors (client's fault)
//! - **T** — Step-level errors (skipped, transient, invariant violation)
//! - **P** — Pipeline lifecycle errors (construction, initialization)
//! - **S** — System errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Enumeration of all scheduler error codes, organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // ── Request (Q) ───────────────────────────────────────────────────
    /// The request body could not be parsed.
    MalformedRequestBody,
    /// The request asked for a rebuild, which this core does not support.
    UnsupportedRebuild,
    /// The request asked for more than one instance.
    MultiInstanceUnsupported,
    /// `weights` and `subjects` are not the same set.
    SubjectWeightSetMismatch,
    /// The request carries zero subjects.
    EmptySubjectSet,

    // ── Step (T) ──────────────────────────────────────────────────────
    /// The step's impl name is not registered in the factory map.
    UnknownStepImpl,
    /// A step's `Init` failed.
    StepInitFailed,
    /// A step exceeded the request deadline.
    StepTimedOut,
    /// A step returned an error other than `StepSkipped`.
    StepTransientFailure,
    /// The validation wrapper found a post-hoc invariant violation.
    StepInvariantViolation,

    // ── Pipeline (P) ──────────────────────────────────────────────────
    /// A filter's `Init` failed — critical, the pipeline is rejected.
    CriticalFilterInitFailed,
    /// The pipeline has no instance available for the requested
    /// domain/type.
    PipelineNotReady,
    /// The declarative pipeline configuration is invalid.
    PipelineConfigInvalid,

    // ── System (S) ────────────────────────────────────────────────────
    /// JSON serialization or deserialization failed.
    SerializationError,
    /// An unexpected internal error occurred.
    InternalError,
    /// An internal channel was closed unexpectedly.
    ChannelClosed,
    /// An async task failed to join.
    TaskJoinError,
}

impl ErrorCode {
    /// Machine-readable code string (e.g. `"SCH-Q001"`).
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedRequestBody => "SCH-Q001",
            Self::UnsupportedRebuild => "SCH-Q002",
            Self::MultiInstanceUnsupported => "SCH-Q003",
            Self::SubjectWeightSetMismatch => "SCH-Q004",
            Self::EmptySubjectSet => "SCH-Q005",

            Self::UnknownStepImpl => "SCH-T001",
            Self::StepInitFailed => "SCH-T002",
            Self::StepTimedOut => "SCH-T003",
            Self::StepTransientFailure => "SCH-T004",
            Self::StepInvariantViolation => "SCH-T005",

            Self::CriticalFilterInitFailed => "SCH-P001",
            Self::PipelineNotReady => "SCH-P002",
            Self::PipelineConfigInvalid => "SCH-P003",

            Self::SerializationError => "SCH-S001",
            Self::InternalError => "SCH-S002",
            Self::ChannelClosed => "SCH-S003",
            Self::TaskJoinError => "SCH-S004",
        }
    }

    /// Human-readable category label.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::MalformedRequestBody
            | Self::UnsupportedRebuild
            | Self::MultiInstanceUnsupported
            | Self::SubjectWeightSetMismatch
            | Self::EmptySubjectSet => "request",

            Self::UnknownStepImpl
            | Self::StepInitFailed
            | Self::StepTimedOut
            | Self::StepTransientFailure
            | Self::StepInvariantViolation => "step",

            Self::CriticalFilterInitFailed
            | Self::PipelineNotReady
            | Self::PipelineConfigInvalid => "pipeline",

            Self::SerializationError
            | Self::InternalError
            | Self::ChannelClosed
            | Self::TaskJoinError => "system",
        }
    }

    /// Short human-readable description of this error code.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::MalformedRequestBody => "the request body could not be parsed",
            Self::UnsupportedRebuild => "rebuild requests are not supported",
            Self::MultiInstanceUnsupported => "num_instances must be 1",
            Self::SubjectWeightSetMismatch => "weights and subjects are not the same set",
            Self::EmptySubjectSet => "request carries zero subjects",

            Self::UnknownStepImpl => "the step impl name is not registered",
            Self::StepInitFailed => "step initialization failed",
            Self::StepTimedOut => "step exceeded the request deadline",
            Self::StepTransientFailure => "step returned a transient error",
            Self::StepInvariantViolation => "step violated a post-hoc invariant",

            Self::CriticalFilterInitFailed => "a filter's Init failed; pipeline rejected",
            Self::PipelineNotReady => "no pipeline instance is ready for this domain/type",
            Self::PipelineConfigInvalid => "the declarative pipeline configuration is invalid",

            Self::SerializationError => "serialization or deserialization failed",
            Self::InternalError => "an unexpected internal error occurred",
            Self::ChannelClosed => "an internal channel was closed unexpectedly",
            Self::TaskJoinError => "an async task failed to join",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The unified error type for the scheduler engine.
///
/// Every variant carries an [`ErrorCode`] via [`SchedulerError::code`] so
/// HTTP adapters and telemetry can classify failures without matching on
/// message text.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Client-supplied request failed validation.
    #[error("{code}: {message}")]
    Request {
        /// Which request-validation rule failed.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },

    /// A step-level failure that the pipeline executor degrades past.
    #[error("{code}: step '{step_name}': {message}")]
    Step {
        /// Which step-level failure occurred.
        code: ErrorCode,
        /// The offending step's configured name.
        step_name: String,
        /// Human-readable detail.
        message: String,
    },

    /// A pipeline construction/lifecycle failure.
    #[error("{code}: pipeline '{pipeline_name}': {message}")]
    Pipeline {
        /// Which pipeline-lifecycle failure occurred.
        code: ErrorCode,
        /// The pipeline's configured name.
        pipeline_name: String,
        /// Human-readable detail.
        message: String,
    },

    /// An internal error not attributable to the request or a step.
    #[error("{code}: {message}")]
    Internal {
        /// Which system-level failure occurred.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },
}

impl SchedulerError {
    /// The [`ErrorCode`] carried by this error, regardless of variant.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Request { code, .. }
            | Self::Step { code, .. }
            | Self::Pipeline { code, .. }
            | Self::Internal { code, .. } => *code,
        }
    }

    /// Construct a [`SchedulerError::Request`].
    #[must_use]
    pub fn request(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Request {
            code,
            message: message.into(),
        }
    }

    /// Construct a [`SchedulerError::Step`].
    #[must_use]
    pub fn step(code: ErrorCode, step_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Step {
            code,
            step_name: step_name.into(),
            message: message.into(),
        }
    }

    /// Construct a [`SchedulerError::Pipeline`].
    #[must_use]
    pub fn pipeline(
        code: ErrorCode,
        pipeline_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Pipeline {
            code,
            pipeline_name: pipeline_name.into(),
            message: message.into(),
        }
    }

    /// Construct a [`SchedulerError::Internal`].
    #[must_use]
    pub fn internal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Internal {
            code,
            message: message.into(),
        }
    }
}
