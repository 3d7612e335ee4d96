// SPDX-License-Identifier: MIT OR Apache-2.0
//! Placement request contract.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Domain-specific attributes a step may query (project id, resource kind,
/// rebuild/resize/live flags). The core neither inspects nor mutates these;
/// they are opaque payload carried alongside the subjects and weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RequestAttributes {
    /// Project (tenant) the placement is being made for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Kind of resource being placed ("instance", "volume", "share", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_kind: Option<String>,

    /// Number of instances the upstream scheduler asked to place.
    ///
    /// The core's single-instance Non-goal is enforced by the request
    /// adapter, not here; this field is carried opaquely.
    #[serde(default)]
    pub num_instances: u32,

    /// `true` if this is a rebuild of an existing instance in place.
    #[serde(default)]
    pub rebuild: bool,

    /// `true` if this is a resize of an existing instance.
    #[serde(default)]
    pub resize: bool,

    /// `true` if this is a live-migration placement decision.
    #[serde(default)]
    pub live: bool,

    /// Any additional fields a step implementation expects, opaque to the
    /// core.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Immutable (from a step's point of view) input to a single placement
/// decision.
///
/// `subjects` may contain duplicates — upstream schedulers sometimes name
/// the same placement target at different sub-granularities. The core
/// deduplicates for invariant checks but never for step activation maps,
/// which are keyed by subject id and therefore naturally deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Request {
    /// Ordered sequence of candidate subject identifiers.
    pub subjects: Vec<String>,

    /// Upstream scheduler's real-valued hint per subject.
    pub weights: BTreeMap<String, f64>,

    /// Structured attributes attached to every log line produced while
    /// serving this request.
    pub trace_log_args: BTreeMap<String, String>,

    /// Domain-specific attributes, opaque to the core.
    #[serde(default)]
    pub attributes: RequestAttributes,
}

impl Request {
    /// Construct a request from subjects and weights with no trace args or
    /// attributes. Convenient for tests and for the CLI dry-run fixture
    /// loader.
    #[must_use]
    pub fn new(subjects: Vec<String>, weights: BTreeMap<String, f64>) -> Self {
        Self {
            subjects,
            weights,
            trace_log_args: BTreeMap::new(),
            attributes: RequestAttributes::default(),
        }
    }

    /// Return `subjects` with duplicates removed, preserving first-occurrence
    /// order.
    #[must_use]
    pub fn deduplicated_subjects(&self) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        self.subjects
            .iter()
            .filter(|s| seen.insert((*s).clone()))
            .cloned()
            .collect()
    }

    /// Produce a copy of this request whose `subjects` (and `weights`) are
    /// restricted to the keys of `keep`.
    ///
    /// The original request is never mutated — this is the only operation
    /// filters use to narrow the candidate set between pipeline stages.
    #[must_use]
    pub fn filter_subjects(&self, keep: &BTreeMap<String, f64>) -> Request {
        let mut seen = std::collections::BTreeSet::new();
        let subjects = self
            .subjects
            .iter()
            .filter(|s| keep.contains_key(*s) && seen.insert((*s).clone()))
            .cloned()
            .collect();
        let weights = self
            .weights
            .iter()
            .filter(|(s, _)| keep.contains_key(*s))
            .map(|(s, w)| (s.clone(), *w))
            .collect();
        Request {
            subjects,
            weights,
            trace_log_args: self.trace_log_args.clone(),
            attributes: self.attributes.clone(),
        }
    }
}
