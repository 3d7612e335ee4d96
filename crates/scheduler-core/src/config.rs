// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative pipeline configuration and knowledge readiness.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The kind of resource being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum SchedulingDomain {
    /// Nova: virtual machine compute hosts.
    Nova,
    /// Cinder: block-storage pools.
    Cinder,
    /// Manila: shared-filesystem hosts.
    Manila,
    /// Bare-metal machines.
    Machines,
    /// Kubernetes pods.
    Pods,
}

/// The kind of pipeline a [`PipelineConfig`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum PipelineType {
    /// Filter/weigher placement pipeline — the only kind this core executes.
    FilterWeigher,
    /// Descheduling detector pipeline. The controller runs the same
    /// lifecycle/readiness state machine for these, but execution semantics
    /// are out of scope for this core.
    Detector,
}

/// Per-step validations an operator may relax. Default is all checks
/// active — every field here defaults to `false` ("not disabled").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DisabledValidations {
    /// Disable the weigher invariant that `|activations| ==
    /// |deduplicate(request.subjects)|`.
    #[serde(default)]
    pub same_subject_number_in_out: bool,
    /// Disable the weigher invariant that `|activations| > 0`.
    #[serde(default)]
    pub some_subjects_remain: bool,
}

/// One step entry inside a [`PipelineConfig`]'s `filters`, `weighers`, or
/// `detectors` list.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StepConfig {
    /// Stable identifier used for metrics, logs, and config. Need not be
    /// unique across the whole pipeline, but practically should be.
    pub name: String,

    /// Registered factory key identifying which step implementation to
    /// construct.
    #[serde(rename = "impl")]
    pub step_impl: String,

    /// Opaque parameters, parsed by the step's own option type in `Init`.
    #[serde(default)]
    pub params: serde_json::Value,

    /// Scales this step's contribution during aggregation. Defaults to
    /// `1.0`. Only meaningful for weighers; ignored for filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,

    /// Invariant checks to relax for this step.
    #[serde(default)]
    pub disabled_validations: DisabledValidations,
}

impl StepConfig {
    /// The configured multiplier, or the default of `1.0`.
    #[must_use]
    pub fn multiplier_or_default(&self) -> f64 {
        self.multiplier.unwrap_or(1.0)
    }
}

/// A declarative pipeline definition, as received from the control plane.
/// `filters`/`weighers` are mutually exclusive with `detectors` in practice — a pipeline is either `FilterWeigher` or
/// `Detector` — but both fields are always present on the wire so tooling
/// doesn't need to branch on `type` to parse.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    /// Which fleet this pipeline places resources into.
    pub scheduling_domain: SchedulingDomain,

    /// Which kind of pipeline this is.
    #[serde(rename = "type")]
    pub pipeline_type: PipelineType,

    /// Ordered filter steps (only meaningful when `pipeline_type` is
    /// `FilterWeigher`).
    #[serde(default)]
    pub filters: Vec<StepConfig>,

    /// Ordered weigher steps (only meaningful when `pipeline_type` is
    /// `FilterWeigher`).
    #[serde(default)]
    pub weighers: Vec<StepConfig>,

    /// Ordered detector steps (only meaningful when `pipeline_type` is
    /// `Detector`).
    #[serde(default)]
    pub detectors: Vec<StepConfig>,

    /// Free-text operator-facing description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Stable name identifying this pipeline instance, used as the key in
    /// the controller's `pipelines`/`configs` maps and in metric labels.
    pub name: String,
}

/// A logical feature table a step depends on.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KnowledgeRef {
    /// Name of the knowledge table, as referenced by step params.
    pub name: String,
    /// Scheduling domain this knowledge applies to.
    pub scheduling_domain: SchedulingDomain,
    /// Whether the producer currently reports this knowledge as ready.
    pub ready: bool,
    /// Number of rows currently available. A step may refuse to run unless
    /// all its declared knowledges are ready *and* non-empty.
    pub raw_length: usize,
}

impl KnowledgeRef {
    /// `true` if this knowledge is ready and has at least one row.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.ready && self.raw_length > 0
    }
}
