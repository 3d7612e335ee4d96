// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tests exercising the full pipeline executor — the invariants
//! that need a built `Pipeline`, not just the bare activation algebra.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use scheduler_core::{
    no_effect, norm, DisabledValidations, PipelineConfig, PipelineType, Request, SchedulerError,
    SchedulingDomain, StepConfig, StepResult,
};
use scheduler_runtime::{CancellationToken, Pipeline, SchedulingStep, StepFactory, StepRegistry, StepRunError};

const SUBJECTS: [&str; 4] = ["h1", "h2", "h3", "h4"];

/// A filter that excludes every subject named in its `drop` param.
struct DropNamedFilter {
    drop: Vec<String>,
}

#[async_trait]
impl SchedulingStep for DropNamedFilter {
    async fn init(&mut self, params: serde_json::Value) -> Result<(), SchedulerError> {
        if let Some(names) = params.get("drop").and_then(|v| v.as_array()) {
            self.drop = names.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
        }
        Ok(())
    }
    fn get_name(&self) -> &str {
        "drop_named"
    }
    async fn run(&self, request: &Request) -> Result<StepResult, StepRunError> {
        let activations = request
            .deduplicated_subjects()
            .into_iter()
            .filter(|s| !self.drop.contains(s))
            .map(|s| (s, no_effect()))
            .collect();
        Ok(StepResult::with_activations(activations))
    }
}

fn empty_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        scheduling_domain: SchedulingDomain::Nova,
        pipeline_type: PipelineType::FilterWeigher,
        filters: vec![],
        weighers: vec![],
        detectors: vec![],
        description: None,
        name: "property-empty".to_string(),
    }
}

fn drop_named_config(drop: &[&str]) -> PipelineConfig {
    PipelineConfig {
        scheduling_domain: SchedulingDomain::Nova,
        pipeline_type: PipelineType::FilterWeigher,
        filters: vec![StepConfig {
            name: "drop-named".to_string(),
            step_impl: "drop_named".to_string(),
            params: serde_json::json!({ "drop": drop }),
            multiplier: None,
            disabled_validations: DisabledValidations::default(),
        }],
        weighers: vec![],
        detectors: vec![],
        description: None,
        name: "property-drop".to_string(),
    }
}

fn registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry.register(
        "drop_named",
        Arc::new(|| Box::new(DropNamedFilter { drop: vec![] }) as Box<dyn SchedulingStep>) as StepFactory,
    );
    registry
}

fn weights_strategy() -> impl Strategy<Value = BTreeMap<String, f64>> {
    // Duplicate-prone range so the generator reliably exercises the
    // tie-break rule (invariant 5), not just already-distinct scores.
    proptest::collection::vec(-3.0f64..3.0, SUBJECTS.len())
        .prop_map(|values| SUBJECTS.iter().map(|s| s.to_string()).zip(values).collect())
}

proptest! {
    /// Invariant 5: a pipeline with no filters and no weighers orders
    /// subjects by `norm(weight)` descending, ties broken by the
    /// subjects' original (deduplicated) order.
    #[test]
    fn empty_pipeline_sorts_by_normalized_weight_with_input_order_tiebreak(
        weights in weights_strategy()
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let subjects: Vec<String> = SUBJECTS.iter().map(|s| s.to_string()).collect();
            let request = Request::new(subjects.clone(), weights.clone());
            let pipeline = Pipeline::build(&empty_pipeline_config(), &registry(), None).await.unwrap();
            let decision = pipeline.run(&request, &CancellationToken::new()).await.unwrap();

            let mut expected = subjects.clone();
            expected.sort_by(|a, b| {
                norm(weights[b]).partial_cmp(&norm(weights[a])).unwrap().then_with(|| {
                    let ia = subjects.iter().position(|s| s == a).unwrap();
                    let ib = subjects.iter().position(|s| s == b).unwrap();
                    ia.cmp(&ib)
                })
            });

            prop_assert_eq!(decision.ordered_hosts, expected);
        });
    }

    /// Invariant 2: `orderedHosts` is always a subset of the deduplicated
    /// input subjects, even after an arbitrary filter runs.
    #[test]
    fn ordered_hosts_is_always_a_subset_of_input_subjects(
        weights in weights_strategy(),
        drop_h2 in any::<bool>(),
        drop_h3 in any::<bool>(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut dropped = vec![];
            if drop_h2 { dropped.push("h2"); }
            if drop_h3 { dropped.push("h3"); }

            let subjects: Vec<String> = SUBJECTS.iter().map(|s| s.to_string()).collect();
            let request = Request::new(subjects.clone(), weights);
            let pipeline = Pipeline::build(&drop_named_config(&dropped), &registry(), None).await.unwrap();
            let decision = pipeline.run(&request, &CancellationToken::new()).await.unwrap();

            for host in &decision.ordered_hosts {
                prop_assert!(subjects.contains(host));
            }
            for name in &dropped {
                prop_assert!(!decision.ordered_hosts.contains(&(*name).to_string()));
            }
        });
    }

    /// Invariant 4: removing a subject from a filter's activation map
    /// excludes it from the decision, regardless of which subject it is.
    #[test]
    fn dropped_subject_is_excluded_from_the_decision(
        weights in weights_strategy(),
        drop_index in 0usize..SUBJECTS.len(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dropped = SUBJECTS[drop_index];
            let subjects: Vec<String> = SUBJECTS.iter().map(|s| s.to_string()).collect();
            let request = Request::new(subjects, weights);
            let pipeline = Pipeline::build(&drop_named_config(&[dropped]), &registry(), None).await.unwrap();
            let decision = pipeline.run(&request, &CancellationToken::new()).await.unwrap();

            prop_assert!(!decision.ordered_hosts.contains(&dropped.to_string()));
        });
    }
}
