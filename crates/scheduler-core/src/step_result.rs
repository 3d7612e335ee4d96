// SPDX-License-Identifier: MIT OR Apache-2.0
//! The shape a step returns from `Run`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque diagnostic data a step attaches to its verdict, keyed by an
/// arbitrary statistic name (e.g. `"free_ram_mb"`, `"contention_score"`).
///
/// Consumed downstream by the monitor wrapper's impact computation and by
/// log summaries; otherwise never interpreted by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepStatistics {
    /// Unit string for display purposes (e.g. `"MB"`, `"score"`).
    pub unit: String,
    /// Per-subject values for this statistic.
    pub values: BTreeMap<String, f64>,
}

impl StepStatistics {
    /// Construct a new statistic with the given unit and no values.
    #[must_use]
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            values: BTreeMap::new(),
        }
    }
}

/// A step's verdict for one invocation.
///
/// `activations` maps a subject to a signed adjustment: a subject present
/// with value `a` means "adjust this subject's aggregated score by `a`"; a
/// subject **absent** means the step excludes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    /// Per-subject activation values.
    pub activations: BTreeMap<String, f64>,
    /// Opaque diagnostic statistics, keyed by statistic name.
    pub statistics: BTreeMap<String, StepStatistics>,
}

impl StepResult {
    /// An empty result: no activations, no statistics.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Construct a result carrying only activations.
    #[must_use]
    pub fn with_activations(activations: BTreeMap<String, f64>) -> Self {
        Self {
            activations,
            statistics: BTreeMap::new(),
        }
    }
}
