// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative pipeline configuration: loading, validation, and merging.
//!
//! Two on-disk shapes are supported: a flat TOML file listing one or more
//! [`scheduler_core::PipelineConfig`]s (for local development and the CLI's
//! dry-run mode), and a YAML [`PipelineResource`] shaped like a Kubernetes
//! custom resource (for a control plane that reuses the k8s watch/apply
//! idiom). Both parse into the same `Vec<PipelineConfig>` the controller
//! consumes.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use schemars::JsonSchema;
use scheduler_core::PipelineConfig;
use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found or could not be read.
    #[error("config file not found or unreadable: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config as TOML: {reason}")]
    TomlParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// The file could not be parsed as a valid YAML pipeline resource.
    #[error("failed to parse config as YAML: {reason}")]
    YamlParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Two pipelines in the same load were declared under the same name.
    #[error("duplicate pipeline name: {name}")]
    DuplicateName {
        /// The colliding name.
        name: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// Advisory-level issues that do not prevent a pipeline from being
/// accepted but deserve operator attention.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// A `FilterWeigher` pipeline was declared with no weighers, so every
    /// surviving subject will be scored purely by its raw input weight.
    NoWeighersConfigured {
        /// The pipeline's name.
        pipeline: String,
    },
    /// A `Detector` pipeline was declared with no detector steps.
    NoDetectorsConfigured {
        /// The pipeline's name.
        pipeline: String,
    },
    /// Two steps in the same list share a `name`; metrics and logs for
    /// them will be indistinguishable.
    DuplicateStepName {
        /// The pipeline's name.
        pipeline: String,
        /// The repeated step name.
        step: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoWeighersConfigured { pipeline } => {
                write!(f, "pipeline '{pipeline}' has no weighers configured")
            }
            Self::NoDetectorsConfigured { pipeline } => {
                write!(f, "pipeline '{pipeline}' has no detectors configured")
            }
            Self::DuplicateStepName { pipeline, step } => {
                write!(f, "pipeline '{pipeline}' declares step name '{step}' more than once")
            }
        }
    }
}

/// A flat TOML document listing every pipeline an operator wants loaded in
/// one file — the shape used for local development and CLI fixtures.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct PipelineConfigFile {
    /// The pipelines declared in this file.
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

/// A single pipeline declaration shaped like a Kubernetes custom resource,
/// for a control plane that watches/applies YAML manifests.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResource {
    /// Resource API version, e.g. `"scheduler.example.com/v1"`.
    pub api_version: String,
    /// Resource kind, conventionally `"SchedulerPipeline"`.
    pub kind: String,
    /// Resource metadata.
    pub metadata: PipelineResourceMetadata,
    /// The embedded pipeline configuration.
    pub spec: PipelineConfig,
}

/// Metadata block of a [`PipelineResource`].
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct PipelineResourceMetadata {
    /// Resource name. Should match `spec.name`; [`validate_pipeline_config`]
    /// does not enforce this itself, since the controller keys off
    /// `spec.name` either way.
    pub name: String,
}

/// Load every pipeline declared in a flat TOML file.
///
/// # Errors
///
/// Returns [`ConfigError::FileNotFound`] if `path` cannot be read, or
/// [`ConfigError::TomlParseError`] if its contents don't parse.
pub fn load_pipelines_toml(path: &Path) -> Result<Vec<PipelineConfig>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })?;
    parse_pipelines_toml(&content)
}

/// Parse a TOML string into the list of pipelines it declares.
///
/// # Errors
///
/// Returns [`ConfigError::TomlParseError`] if `content` doesn't parse.
pub fn parse_pipelines_toml(content: &str) -> Result<Vec<PipelineConfig>, ConfigError> {
    let file: PipelineConfigFile = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
        reason: e.to_string(),
    })?;
    Ok(file.pipelines)
}

/// Parse a single YAML [`PipelineResource`] manifest.
///
/// # Errors
///
/// Returns [`ConfigError::YamlParseError`] if `content` doesn't parse.
pub fn parse_pipeline_resource_yaml(content: &str) -> Result<PipelineResource, ConfigError> {
    serde_yaml::from_str(content).map_err(|e| ConfigError::YamlParseError {
        reason: e.to_string(),
    })
}

/// A pure per-`impl` check of a filter's opaque `params`, run at
/// admission time before a config is accepted — keyed the same way [`scheduler_runtime::StepRegistry`] keys its
/// constructors, but independent of it, since config admission happens
/// before any step is constructed.
pub type FilterParamValidator = Arc<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>;

/// A registry of [`FilterParamValidator`]s, consulted by
/// [`validate_pipeline_config`] for every filter step whose `impl` has a
/// registered validator. Filters with no registered validator are
/// accepted without a params check — most steps have no required shape
/// beyond what their own `Init` enforces at build time.
#[derive(Clone, Default)]
pub struct FilterValidatorRegistry {
    validators: BTreeMap<String, FilterParamValidator>,
}

impl FilterValidatorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a params validator under `impl_name`.
    pub fn register(&mut self, impl_name: impl Into<String>, validator: FilterParamValidator) {
        self.validators.insert(impl_name.into(), validator);
    }
}

/// Validate one pipeline config, returning advisory warnings.
///
/// Hard errors — duplicate step names within a list are *not* hard errors
/// (they're a warning; the executor tolerates them), but a registered
/// filter validator rejecting its params, or an empty pipeline `name`,
/// are returned as [`ConfigError::ValidationError`].
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] with one reason string per
/// problem found.
pub fn validate_pipeline_config(
    config: &PipelineConfig,
    validators: &FilterValidatorRegistry,
) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if config.name.trim().is_empty() {
        errors.push("pipeline name must not be empty".to_string());
    }

    for filter in &config.filters {
        if let Some(validator) = validators.validators.get(&filter.step_impl) {
            if let Err(reason) = validator(&filter.params) {
                errors.push(format!("filter '{}' ({}): {reason}", filter.name, filter.step_impl));
            }
        }
    }

    match config.pipeline_type {
        scheduler_core::PipelineType::FilterWeigher => {
            if config.weighers.is_empty() {
                warnings.push(ConfigWarning::NoWeighersConfigured {
                    pipeline: config.name.clone(),
                });
            }
        }
        scheduler_core::PipelineType::Detector => {
            if config.detectors.is_empty() {
                warnings.push(ConfigWarning::NoDetectorsConfigured {
                    pipeline: config.name.clone(),
                });
            }
        }
    }

    let mut seen_names: BTreeMap<&str, usize> = BTreeMap::new();
    for step in config.filters.iter().chain(&config.weighers).chain(&config.detectors) {
        *seen_names.entry(step.name.as_str()).or_insert(0) += 1;
    }
    for (name, count) in seen_names {
        if count > 1 {
            warnings.push(ConfigWarning::DuplicateStepName {
                pipeline: config.name.clone(),
                step: name.to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

/// Merge two pipeline lists by `name`, keyed as the controller's `configs`
/// map is keyed: entries from `overlay` replace entries from `base` with
/// the same name; entries present in only one side pass through unchanged.
#[must_use]
pub fn merge_pipelines(base: Vec<PipelineConfig>, overlay: Vec<PipelineConfig>) -> Vec<PipelineConfig> {
    let mut by_name: BTreeMap<String, PipelineConfig> =
        base.into_iter().map(|c| (c.name.clone(), c)).collect();
    for config in overlay {
        by_name.insert(config.name.clone(), config);
    }
    by_name.into_values().collect()
}

/// Check a list of pipelines for duplicate names, as would occur if the
/// same file declared two pipelines under one name.
///
/// # Errors
///
/// Returns [`ConfigError::DuplicateName`] for the first collision found.
pub fn check_unique_names(configs: &[PipelineConfig]) -> Result<(), ConfigError> {
    let mut seen = std::collections::BTreeSet::new();
    for config in configs {
        if !seen.insert(config.name.as_str()) {
            return Err(ConfigError::DuplicateName { name: config.name.clone() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::{DisabledValidations, PipelineType, SchedulingDomain, StepConfig};

    fn step(name: &str, step_impl: &str) -> StepConfig {
        StepConfig {
            name: name.to_string(),
            step_impl: step_impl.to_string(),
            params: serde_json::Value::Null,
            multiplier: None,
            disabled_validations: DisabledValidations::default(),
        }
    }

    fn config(name: &str) -> PipelineConfig {
        PipelineConfig {
            scheduling_domain: SchedulingDomain::Nova,
            pipeline_type: PipelineType::FilterWeigher,
            filters: vec![step("f", "some_filter")],
            weighers: vec![step("w", "some_weigher")],
            detectors: vec![],
            description: None,
            name: name.to_string(),
        }
    }

    #[test]
    fn parse_toml_file_with_one_pipeline() {
        let toml = r#"
            [[pipelines]]
            scheduling_domain = "Nova"
            type = "FilterWeigher"
            name = "nova-default"

            [[pipelines.weighers]]
            name = "contention"
            impl = "contention_avoidance"
        "#;
        let pipelines = parse_pipelines_toml(toml).unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].name, "nova-default");
        assert_eq!(pipelines[0].weighers[0].step_impl, "contention_avoidance");
    }

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let err = parse_pipelines_toml("this is [not valid =").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError { .. }));
    }

    #[test]
    fn parse_yaml_resource_roundtrips_spec() {
        let yaml = r#"
apiVersion: scheduler.example.com/v1
kind: SchedulerPipeline
metadata:
  name: nova-default
spec:
  scheduling_domain: Nova
  type: FilterWeigher
  name: nova-default
  weighers: []
  filters: []
  detectors: []
"#;
        let resource = parse_pipeline_resource_yaml(yaml).unwrap();
        assert_eq!(resource.metadata.name, "nova-default");
        assert_eq!(resource.spec.name, "nova-default");
    }

    #[test]
    fn invalid_yaml_gives_parse_error() {
        let err = parse_pipeline_resource_yaml("not: [valid").unwrap_err();
        assert!(matches!(err, ConfigError::YamlParseError { .. }));
    }

    #[test]
    fn empty_name_is_a_hard_error() {
        let mut cfg = config("");
        cfg.name = "".to_string();
        let err = validate_pipeline_config(&cfg, &FilterValidatorRegistry::new()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn no_weighers_produces_warning_not_error() {
        let mut cfg = config("p");
        cfg.weighers.clear();
        let warnings = validate_pipeline_config(&cfg, &FilterValidatorRegistry::new()).unwrap();
        assert!(warnings.contains(&ConfigWarning::NoWeighersConfigured { pipeline: "p".to_string() }));
    }

    #[test]
    fn duplicate_step_name_across_lists_warns() {
        let mut cfg = config("p");
        cfg.weighers.push(step("f", "other_weigher"));
        let warnings = validate_pipeline_config(&cfg, &FilterValidatorRegistry::new()).unwrap();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::DuplicateStepName { step, .. } if step == "f")));
    }

    #[test]
    fn registered_validator_rejects_bad_params() {
        let mut registry = FilterValidatorRegistry::new();
        registry.register(
            "some_filter",
            Arc::new(|params| {
                if params.is_null() {
                    Err("params must not be null".to_string())
                } else {
                    Ok(())
                }
            }),
        );
        let cfg = config("p");
        let err = validate_pipeline_config(&cfg, &registry).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("params must not be null")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn merge_overlay_wins_on_name_collision() {
        let base = vec![config("p")];
        let mut overlay_cfg = config("p");
        overlay_cfg.description = Some("overlay".to_string());
        let merged = merge_pipelines(base, vec![overlay_cfg]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].description.as_deref(), Some("overlay"));
    }

    #[test]
    fn merge_keeps_entries_unique_to_each_side() {
        let merged = merge_pipelines(vec![config("a")], vec![config("b")]);
        let names: Vec<&str> = merged.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"a"));
        assert!(names.contains(&"b"));
    }

    #[test]
    fn check_unique_names_detects_collision() {
        let configs = vec![config("p"), config("p")];
        let err = check_unique_names(&configs).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { .. }));
    }

    #[test]
    fn load_pipelines_from_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipelines.toml");
        std::fs::write(
            &path,
            r#"
            [[pipelines]]
            scheduling_domain = "Cinder"
            type = "FilterWeigher"
            name = "cinder-default"
            "#,
        )
        .unwrap();
        let pipelines = load_pipelines_toml(&path).unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].name, "cinder-default");
    }

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_pipelines_toml(Path::new("/nonexistent/pipelines.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
