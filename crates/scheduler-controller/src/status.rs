// SPDX-License-Identifier: MIT OR Apache-2.0
//! Status conditions patched onto a pipeline after each reconcile:
//! `Ready`, `AllStepsReady`, `AllStepsIndexed`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::PipelineState;

/// Whether a condition currently holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    /// The condition holds.
    True,
    /// The condition does not hold.
    False,
}

/// One status condition: a boolean plus a stable reason and a free-text
/// message naming the offending steps, if any.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    /// Condition name, e.g. `"Ready"`.
    pub kind: String,
    /// Whether it currently holds.
    pub status: ConditionStatus,
    /// Stable machine-readable reason.
    pub reason: String,
    /// Human-readable message, naming offending step names when relevant.
    pub message: String,
}

impl Condition {
    fn new(kind: &str, holds: bool, reason: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            status: if holds { ConditionStatus::True } else { ConditionStatus::False },
            reason: reason.to_string(),
            message: message.into(),
        }
    }
}

/// The full set of conditions patched onto a pipeline after a reconcile,
/// plus the lifecycle state they summarize.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineStatus {
    /// The pipeline's name (matches `configs`/`pipelines` map key).
    pub name: String,
    /// Current lifecycle state.
    #[serde(with = "state_serde")]
    pub state: PipelineState,
    /// `True` iff the pipeline is serving (`Ready` or
    /// `ReadyButSomeStepsUnready`).
    pub ready: Condition,
    /// `True` iff every weigher/detector initialized without error.
    pub all_steps_ready: Condition,
    /// `True` iff every configured `impl` name resolved in the registry.
    pub all_steps_indexed: Condition,
}

mod state_serde {
    use super::PipelineState;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(state: &PipelineState, s: S) -> Result<S::Ok, S::Error> {
        state.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PipelineState, D::Error> {
        PipelineState::deserialize(d)
    }
}

impl PipelineStatus {
    /// Build the status for a successful build with no dropped steps.
    #[must_use]
    pub fn ready(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: PipelineState::Ready,
            ready: Condition::new("Ready", true, "BuildSucceeded", "all steps initialized"),
            all_steps_ready: Condition::new("AllStepsReady", true, "AllStepsReady", "no steps dropped"),
            all_steps_indexed: Condition::new(
                "AllStepsIndexed",
                true,
                "AllStepsIndexed",
                "every configured impl resolved",
            ),
        }
    }

    /// Build the status for a build with non-critical weigher/detector
    /// drops. `dropped` is the list of `(step_name, reason, unknown_impl)`
    /// entries for every dropped step.
    #[must_use]
    pub fn ready_with_dropped_steps(name: impl Into<String>, dropped: &[(String, String, bool)]) -> Self {
        let offending: Vec<&str> = dropped.iter().map(|(n, _, _)| n.as_str()).collect();
        let unknown: Vec<&str> = dropped
            .iter()
            .filter(|(_, _, unknown_impl)| *unknown_impl)
            .map(|(n, _, _)| n.as_str())
            .collect();
        Self {
            name: name.into(),
            state: PipelineState::ReadyButSomeStepsUnready,
            ready: Condition::new(
                "Ready",
                true,
                "BuildSucceededPartially",
                format!("serving with {} step(s) dropped: {}", dropped.len(), offending.join(", ")),
            ),
            all_steps_ready: Condition::new(
                "AllStepsReady",
                false,
                "StepsDropped",
                format!("dropped steps: {}", offending.join(", ")),
            ),
            all_steps_indexed: Condition::new(
                "AllStepsIndexed",
                unknown.is_empty(),
                if unknown.is_empty() { "AllStepsIndexed" } else { "UnknownImpl" },
                if unknown.is_empty() {
                    "every configured impl resolved".to_string()
                } else {
                    format!("unregistered impl for step(s): {}", unknown.join(", "))
                },
            ),
        }
    }

    /// Build the status for a critical filter-init failure.
    #[must_use]
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            name: name.into(),
            state: PipelineState::Failed,
            ready: Condition::new("Ready", false, "CriticalFilterInitFailed", reason.clone()),
            all_steps_ready: Condition::new("AllStepsReady", false, "CriticalFilterInitFailed", reason),
            all_steps_indexed: Condition::new(
                "AllStepsIndexed",
                false,
                "BuildAborted",
                "build aborted before steps could be indexed",
            ),
        }
    }
}
