// SPDX-License-Identifier: MIT OR Apache-2.0
//! Post-hoc invariant checks for step results.
//!
//! These are pure functions over already-produced data; they do not call
//! into steps themselves. The runtime's validation wrapper invokes them
//! after a step's `Run` returns, and an operator may relax individual
//! checks per step via [`crate::config::DisabledValidations`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single invariant violated by a step's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvariantViolation {
    /// A filter returned a subject that was not in its input.
    IntroducedUnknownSubject {
        /// The offending subject id.
        subject: String,
    },
    /// A weigher's activation count does not match the deduplicated
    /// input subject count.
    ActivationCountMismatch {
        /// Number of deduplicated input subjects.
        expected: usize,
        /// Number of activation entries the step returned.
        actual: usize,
    },
    /// A weigher returned zero activations when at least one was
    /// required.
    NoSubjectsRemain,
    /// An activation value was not finite (`NaN` or `±inf`).
    NonFiniteActivation {
        /// The subject whose activation was non-finite.
        subject: String,
    },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IntroducedUnknownSubject { subject } => {
                write!(f, "step introduced unknown subject '{subject}'")
            }
            Self::ActivationCountMismatch { expected, actual } => write!(
                f,
                "activation count {actual} does not match deduplicated subject count {expected}"
            ),
            Self::NoSubjectsRemain => write!(f, "step left zero subjects"),
            Self::NonFiniteActivation { subject } => {
                write!(f, "activation for subject '{subject}' is not finite")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Check that a filter's surviving subject set is a subset of what it was
/// given.
#[must_use]
pub fn check_filter_subset(input: &[String], output: &BTreeMap<String, f64>) -> Vec<InvariantViolation> {
    let input_set: std::collections::BTreeSet<&String> = input.iter().collect();
    output
        .keys()
        .filter(|s| !input_set.contains(s))
        .map(|s| InvariantViolation::IntroducedUnknownSubject { subject: s.clone() })
        .collect()
}

/// Check weigher output invariants: activation count matches the
/// deduplicated input count, every activation is finite, and at least one
/// subject remains.
///
/// `disabled` flags select which checks to skip.
#[must_use]
pub fn check_weigher_invariants(
    deduplicated_input: &[String],
    activations: &BTreeMap<String, f64>,
    skip_count_check: bool,
    skip_nonempty_check: bool,
) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    if !skip_count_check && activations.len() != deduplicated_input.len() {
        violations.push(InvariantViolation::ActivationCountMismatch {
            expected: deduplicated_input.len(),
            actual: activations.len(),
        });
    }

    if !skip_nonempty_check && activations.is_empty() {
        violations.push(InvariantViolation::NoSubjectsRemain);
    }

    for (subject, value) in activations {
        if !value.is_finite() {
            violations.push(InvariantViolation::NonFiniteActivation {
                subject: subject.clone(),
            });
        }
    }

    violations
}
