#![deny(unsafe_code)]
#![warn(missing_docs)]
//! scheduler-controller
//!
//! The pipeline controller: owns one `(scheduling_domain, pipeline_type)`
//! fleet's worth of built [`scheduler_runtime::Pipeline`]s, reconciling them
//! against a declarative config stream and a knowledge-readiness stream.
//! Request serving reads through [`controller::PipelineController::pipeline`];
//! all mutation happens through the two `handle_*_event` methods.

/// The reconciliation loop itself.
pub mod controller;
/// Event types the controller consumes.
pub mod events;
/// Per-pipeline lifecycle state machine.
pub mod state;
/// Status condition types patched onto each pipeline after a reconcile.
pub mod status;

pub use controller::PipelineController;
pub use events::{ConfigEvent, KnowledgeEvent};
pub use state::PipelineState;
pub use status::{Condition, ConditionStatus, PipelineStatus};
