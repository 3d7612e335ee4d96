// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event types the controller reacts to: config changes from the control
//! plane's pipeline-config stream, and readiness changes from its
//! knowledge stream.

use scheduler_core::{PipelineConfig, SchedulingDomain};

/// One event from the pipeline-config watch stream.
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// A pipeline config was created or replaced.
    Upserted {
        /// The pipeline's name (map key).
        name: String,
        /// Its current declarative configuration.
        config: PipelineConfig,
    },
    /// A pipeline config was removed from the control plane.
    Deleted {
        /// The pipeline's name (map key).
        name: String,
    },
}

/// One event from the knowledge readiness watch stream.
///
/// The controller reacts only when `ready` flips or `raw_length` crosses
/// zero — callers should still emit events on every underlying change;
/// `Controller` does the flip/crossing check itself so a producer doesn't
/// need to track prior state.
#[derive(Debug, Clone)]
pub struct KnowledgeEvent {
    /// The knowledge table's name.
    pub name: String,
    /// Scheduling domain this knowledge applies to.
    pub scheduling_domain: SchedulingDomain,
    /// Whether the producer currently reports this knowledge as ready.
    pub ready: bool,
    /// Current row count.
    pub raw_length: usize,
}
