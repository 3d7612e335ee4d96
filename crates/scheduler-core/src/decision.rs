// SPDX-License-Identifier: MIT OR Apache-2.0
//! Decision output record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::step_result::StepResult;

/// Outcome status attached to a [`Decision`].
///
/// An empty `ordered_hosts` is a legitimate outcome ("no host satisfies
/// constraints") and is reported as `Failed` here even though the HTTP
/// adapter still returns `200 OK` with an empty host list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionStatus {
    /// At least one subject survived to the final ordering.
    Ok,
    /// Every candidate subject was filtered out.
    Failed {
        /// Human-readable reason, e.g. `"no valid hosts"`.
        reason: String,
    },
}

/// One step's contribution to a decision, as recorded for telemetry and
/// logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResultEntry {
    /// The step's configured name.
    pub step_name: String,
    /// The step's verdict, or `None` if it was skipped/discarded.
    pub result: Option<StepResult>,
}

/// The output of a single `Run` of the pipeline executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// The upstream scheduler's weights, verbatim.
    pub raw_in_weights: BTreeMap<String, f64>,
    /// `norm` applied to every value of `raw_in_weights`.
    pub normalized_in_weights: BTreeMap<String, f64>,
    /// The final per-subject score after all filters and weighers ran.
    pub aggregated_out_weights: BTreeMap<String, f64>,
    /// Subjects sorted by `aggregated_out_weights` descending; the sort key
    /// of the whole decision.
    pub ordered_hosts: Vec<String>,
    /// Per-step results, in configured step order, for telemetry and log
    /// summaries.
    pub step_results: Vec<StepResultEntry>,
    /// First element of `ordered_hosts`, or `None` if it is empty.
    pub target_host: Option<String>,
    /// Overall outcome status.
    pub status: DecisionStatus,
}

impl Decision {
    /// Assemble a decision from an already-sorted host list and the
    /// aggregated weights that produced it.
    #[must_use]
    pub fn new(
        raw_in_weights: BTreeMap<String, f64>,
        normalized_in_weights: BTreeMap<String, f64>,
        aggregated_out_weights: BTreeMap<String, f64>,
        ordered_hosts: Vec<String>,
        step_results: Vec<StepResultEntry>,
    ) -> Self {
        let target_host = ordered_hosts.first().cloned();
        let status = if ordered_hosts.is_empty() {
            DecisionStatus::Failed {
                reason: "no valid hosts".to_string(),
            }
        } else {
            DecisionStatus::Ok
        };
        Self {
            raw_in_weights,
            normalized_in_weights,
            aggregated_out_weights,
            ordered_hosts,
            step_results,
            target_host,
            status,
        }
    }
}
