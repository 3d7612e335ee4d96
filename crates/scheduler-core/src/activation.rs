// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scalar functions that normalize and combine weights.
//!
//! Three total functions over real-valued weights: [`no_effect`] (a step's
//! neutral starting point), [`norm`] (bounds an arbitrary upstream weight
//! into `(-1, 1)`), and [`apply`] (the single mechanism by which a step
//! adjusts — or, by omission, filters — a subject's aggregated score).

use std::collections::BTreeMap;

/// The neutral activation value: "no change".
///
/// Steps that intend to leave a subject's score untouched record this value
/// rather than omitting the subject (omission means exclusion, not no-op).
#[must_use]
pub fn no_effect() -> f64 {
    0.0
}

/// Bound an arbitrary upstream weight into `(-1, 1)`, preserving sign and
/// relative magnitude order.
///
/// Upstream schedulers may supply weights of unbounded magnitude; `norm`
/// keeps per-step activations meaningful relative to the input weight.
#[must_use]
pub fn norm(x: f64) -> f64 {
    x.tanh()
}

/// Combine a base weight map with a step's activations.
///
/// For every subject present in `activations`, `out[s] = base[s] +
/// multiplier * tanh(activations[s])`. Subjects in `base` but absent from
/// `activations` are removed from the output — this is the only mechanism
/// by which a step filters. `multiplier` defaults to `1.0`; negative values
/// invert a weigher's preference, `0.0` disables it.
///
/// Subjects present in `activations` but absent from `base` are ignored: a
/// step may never introduce subjects the pipeline did not already carry.
#[must_use]
pub fn apply(
    base: &BTreeMap<String, f64>,
    activations: &BTreeMap<String, f64>,
    multiplier: f64,
) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for (subject, base_weight) in base {
        if let Some(activation) = activations.get(subject) {
            out.insert(subject.clone(), base_weight + multiplier * norm(*activation));
        }
    }
    out
}
