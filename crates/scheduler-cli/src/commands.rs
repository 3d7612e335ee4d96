// SPDX-License-Identifier: MIT OR Apache-2.0
//! Free functions backing each CLI subcommand, kept separate from
//! argument parsing so they can be unit tested without going through
//! `clap`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use schemars::schema_for;
use scheduler_config::{load_pipelines_toml, validate_pipeline_config, ConfigWarning, FilterValidatorRegistry};
use scheduler_core::{Decision, PipelineConfig, Request};
use scheduler_runtime::{CancellationToken, Pipeline, SchedulingStep, StepFactory, StepRegistry, StepRunError};

/// Which schema the `schema` subcommand can print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// JSON schema for [`Request`].
    Request,
    /// JSON schema for [`Decision`].
    Decision,
    /// JSON schema for [`PipelineConfig`].
    PipelineConfig,
}

/// Return the JSON schema string for the given kind.
///
/// # Errors
///
/// Returns an error if the schema fails to serialize, which cannot
/// happen for the derived schemas used here but is propagated for
/// forward compatibility with hand-written schemas.
pub fn schema_json(kind: SchemaKind) -> Result<String> {
    let value = match kind {
        SchemaKind::Request => serde_json::to_value(schema_for!(Request))?,
        SchemaKind::Decision => serde_json::to_value(schema_for!(Decision))?,
        SchemaKind::PipelineConfig => serde_json::to_value(schema_for!(PipelineConfig))?,
    };
    serde_json::to_string_pretty(&value).context("serialize schema")
}

/// Passes every subject through unchanged with activation `0`; the only
/// step impl this CLI's dry-run registry knows about. Real filter and
/// weigher implementations are an operator's own registry extension.
struct NoopStep {
    name: String,
}

#[async_trait]
impl SchedulingStep for NoopStep {
    async fn init(&mut self, _params: serde_json::Value) -> Result<(), scheduler_core::SchedulerError> {
        Ok(())
    }

    fn get_name(&self) -> &str {
        &self.name
    }

    async fn run(&self, request: &Request) -> Result<scheduler_core::StepResult, StepRunError> {
        let activations = request.deduplicated_subjects().into_iter().map(|s| (s, 0.0)).collect();
        Ok(scheduler_core::StepResult::with_activations(activations))
    }
}

fn dry_run_registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    let factory: StepFactory = Arc::new(|| {
        Box::new(NoopStep {
            name: "noop".to_string(),
        }) as Box<dyn SchedulingStep>
    });
    registry.register("noop", factory);
    registry
}

/// Load `config_path`'s pipelines, pick the one named `pipeline_name`,
/// build it against a minimal dry-run registry (only `"noop"` is
/// registered; any other `impl` drops its step the same way a live
/// deployment would report a missing registration), load `request_path`
/// as a [`Request`] fixture, and run it.
///
/// # Errors
///
/// Returns an error if either file can't be read or parsed, if no
/// pipeline named `pipeline_name` exists in the config, or if the
/// pipeline's filters fail to initialize.
pub async fn dry_run(config_path: &Path, pipeline_name: &str, request_path: &Path) -> Result<Decision> {
    let configs = load_pipelines_toml(config_path)
        .with_context(|| format!("load pipeline config '{}'", config_path.display()))?;
    let config = configs
        .into_iter()
        .find(|c| c.name == pipeline_name)
        .with_context(|| format!("no pipeline named '{pipeline_name}' in '{}'", config_path.display()))?;

    let request_content = std::fs::read_to_string(request_path)
        .with_context(|| format!("read request fixture '{}'", request_path.display()))?;
    let request: Request = serde_json::from_str(&request_content)
        .with_context(|| format!("parse request fixture '{}'", request_path.display()))?;

    let registry = dry_run_registry();
    let pipeline = Pipeline::build(&config, &registry, None)
        .await
        .with_context(|| format!("build pipeline '{pipeline_name}'"))?;

    let decision = pipeline
        .run(&request, &CancellationToken::new())
        .await
        .with_context(|| format!("run pipeline '{pipeline_name}'"))?;

    Ok(decision)
}

/// Load and validate every pipeline in `config_path` with the admission
/// rules the control plane applies, returning the warnings collected
/// across all of them.
///
/// # Errors
///
/// Returns an error if the file can't be read/parsed or if any pipeline
/// fails hard validation (an empty name, or a registered filter
/// validator rejecting its params).
pub fn validate_config_file(config_path: &Path) -> Result<Vec<ConfigWarning>> {
    let configs = load_pipelines_toml(config_path)
        .with_context(|| format!("load pipeline config '{}'", config_path.display()))?;
    let validators = FilterValidatorRegistry::new();

    let mut warnings = Vec::new();
    for config in &configs {
        warnings.extend(validate_pipeline_config(config, &validators)?);
    }
    Ok(warnings)
}
