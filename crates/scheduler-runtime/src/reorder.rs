// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reordering and impact measurement for one step's before/after subject
//! ordering.
//!
//! Long-distance moves near the top of the ranking are the signal the
//! monitor wrapper surfaces: a step that quietly demotes the previous
//! top pick is more interesting than one that reshuffles the tail.

use std::collections::BTreeMap;

use scheduler_core::{norm, StepStatistics};

/// Number of top output positions examined for reordering/impact.
pub const TOP_K: usize = 5;

/// One output position's displacement relative to the pre-step ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Shift {
    /// Position (0-based) in the post-step ordering.
    pub out_idx: usize,
    /// Subject occupying that position after the step ran.
    pub subject: String,
    /// That subject's position in the pre-step ordering, or `None` if the
    /// step introduced it (a filter can only remove subjects, so this is
    /// only possible for a misbehaving step; validation would already
    /// have rejected the run by the time this runs in practice).
    pub original_index: Option<usize>,
}

fn sorted_by_score(subjects: impl Iterator<Item = String>, score: impl Fn(&str) -> f64) -> Vec<String> {
    let mut v: Vec<String> = subjects.collect();
    v.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(std::cmp::Ordering::Equal));
    v
}

/// Compute the pre-step ordering (subjects of `in_weights`, by `norm`
/// descending).
#[must_use]
pub fn input_order(in_weights: &BTreeMap<String, f64>) -> Vec<String> {
    sorted_by_score(in_weights.keys().cloned(), |s| norm(in_weights[s]))
}

/// Compute the post-step ordering (subjects the step's activations cover,
/// by `norm(in_weight) + norm(activation)` descending).
#[must_use]
pub fn output_order(in_weights: &BTreeMap<String, f64>, activations: &BTreeMap<String, f64>) -> Vec<String> {
    sorted_by_score(activations.keys().cloned(), |s| {
        norm(in_weights.get(s).copied().unwrap_or(0.0)) + norm(activations[s])
    })
}

/// Compute the top-[`TOP_K`] shifts: for each of the first `TOP_K` output
/// positions, the subject occupying it and its position in `before`.
#[must_use]
pub fn top_shifts(before: &[String], after: &[String]) -> Vec<Shift> {
    after
        .iter()
        .take(TOP_K)
        .enumerate()
        .map(|(out_idx, subject)| Shift {
            out_idx,
            subject: subject.clone(),
            original_index: before.iter().position(|s| s == subject),
        })
        .collect()
}

/// Sum, over the top-K shifts, of `|oldIdx - newIdx| * |stat[old subject at
/// newIdx] - stat[moved subject]|`.
///
/// Shifts whose subject is new (no `original_index`) contribute nothing —
/// there is no "old distance" to weight the statistic delta by.
#[must_use]
pub fn impact(before: &[String], shifts: &[Shift], stat: &StepStatistics) -> f64 {
    shifts
        .iter()
        .filter_map(|shift| {
            let old_idx = shift.original_index?;
            let old_subject_at_new_idx = before.get(shift.out_idx)?;
            let moved_value = stat.values.get(&shift.subject)?;
            let displaced_value = stat.values.get(old_subject_at_new_idx)?;
            let distance = (old_idx as f64 - shift.out_idx as f64).abs();
            Some(distance * (displaced_value - moved_value).abs())
        })
        .sum()
}

/// Render the "before [...], after [...]" structured trace summary for one
/// statistic.
#[must_use]
pub fn trace_summary(stat_name: &str, before: &[String], after: &[String], stat: &StepStatistics) -> String {
    let render = |order: &[String]| -> String {
        order
            .iter()
            .take(TOP_K)
            .map(|s| match stat.values.get(s) {
                Some(v) => format!("{v} {}", stat.unit),
                None => format!("? {}", stat.unit),
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "{stat_name}: before [{}], after [{}]",
        render(before),
        render(after)
    )
}
