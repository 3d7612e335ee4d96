// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! HTTP adapter exposing the placement-request endpoint and pipeline
//! status over the control plane's REST surface.
//!
//! Request validation (rebuild rejection, single-instance enforcement,
//! the weight/host set-equality check) happens entirely in this crate;
//! [`scheduler_core::Request`] itself stays agnostic of how it was
//! assembled. Everything past validation is a read through a
//! [`scheduler_controller::PipelineController`] followed by
//! [`scheduler_runtime::Pipeline::run`] — this crate owns no scheduling
//! logic of its own.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// A single always-available step impl (`"noop"`) useful for smoke
/// testing; real filter and weigher implementations are an operator's
/// own registry extension.
pub mod builtin;

use axum::extract::{Path as AxPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use scheduler_controller::{PipelineController, PipelineStatus};
use scheduler_core::{ErrorCode, Request, RequestAttributes, SchedulerError, SchedulingDomain};
use scheduler_runtime::{CancellationReason, CancellationToken};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// Shared daemon state: one controller per scheduling domain this process
/// serves, plus the per-request deadline handed to every pipeline run.
pub struct AppState {
    controllers: HashMap<SchedulingDomain, Arc<PipelineController>>,
    deadline: Duration,
}

impl AppState {
    /// Construct state from a pre-populated controller map.
    #[must_use]
    pub fn new(controllers: HashMap<SchedulingDomain, Arc<PipelineController>>, deadline: Duration) -> Self {
        Self { controllers, deadline }
    }

    fn controller(&self, domain: SchedulingDomain) -> Option<Arc<PipelineController>> {
        self.controllers.get(&domain).cloned()
    }
}

/// A host candidate as carried on the placement-request wire body.
#[derive(Debug, Clone, Deserialize)]
pub struct HostEntry {
    /// Candidate subject identifier.
    pub name: String,
    /// Upstream-reported status string, opaque to this adapter.
    #[serde(default)]
    pub status: Option<String>,
}

/// Wire shape of the placement request body.
#[derive(Debug, Clone, Deserialize)]
pub struct PlacementRequestBody {
    /// Domain-specific request attributes.
    pub spec: RequestAttributes,
    /// Whether this is a rebuild-in-place request. Always rejected.
    #[serde(default)]
    pub rebuild: bool,
    /// Candidate hosts.
    #[serde(default)]
    pub hosts: Vec<HostEntry>,
    /// Upstream scheduler's per-host weight hints.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

/// Wire shape of the placement response body.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementResponseBody {
    /// Subjects in final ranked order, best first.
    pub hosts: Vec<String>,
}

/// Error envelope returned for every non-2xx response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: Option<ErrorCode>,
    message: String,
}

impl ApiError {
    fn bad_request(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: Some(code),
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: None,
            message: message.into(),
        }
    }

    fn service_unavailable(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: Some(code),
            message: message.into(),
        }
    }

    fn internal(err: SchedulerError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: Some(err.code()),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code.map(|c| c.code()),
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

/// Project a validated wire body into a [`scheduler_core::Request`].
///
/// Rejects a rebuild request, a multi-instance request, and any request
/// whose `weights` keys are not exactly the set of `hosts` names.
///
/// # Errors
///
/// Returns a `400`-mapped [`ApiError`] for any of the rejections above.
pub fn project_request(body: PlacementRequestBody) -> Result<Request, ApiError> {
    if body.rebuild {
        return Err(ApiError::bad_request(
            ErrorCode::UnsupportedRebuild,
            "rebuild requests are not supported by this scheduler",
        ));
    }
    if body.spec.num_instances > 1 {
        return Err(ApiError::bad_request(
            ErrorCode::MultiInstanceUnsupported,
            "num_instances must be 1",
        ));
    }

    let host_names: Vec<String> = body.hosts.iter().map(|h| h.name.clone()).collect();
    let host_set: BTreeSet<&String> = host_names.iter().collect();
    let weight_set: BTreeSet<&String> = body.weights.keys().collect();
    if host_set != weight_set {
        return Err(ApiError::bad_request(
            ErrorCode::SubjectWeightSetMismatch,
            "weights and hosts must name exactly the same set of subjects",
        ));
    }
    if host_names.is_empty() {
        return Err(ApiError::bad_request(
            ErrorCode::EmptySubjectSet,
            "request carries zero candidate hosts",
        ));
    }

    let mut trace_log_args = BTreeMap::new();
    if let Some(project_id) = &body.spec.project_id {
        trace_log_args.insert("project_id".to_string(), project_id.clone());
    }

    let mut attributes = body.spec;
    attributes.rebuild = false;

    Ok(Request {
        subjects: host_names,
        weights: body.weights,
        trace_log_args,
        attributes,
    })
}

fn parse_domain(raw: &str) -> Result<SchedulingDomain, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "nova" => Ok(SchedulingDomain::Nova),
        "cinder" => Ok(SchedulingDomain::Cinder),
        "manila" => Ok(SchedulingDomain::Manila),
        "machines" => Ok(SchedulingDomain::Machines),
        "pods" => Ok(SchedulingDomain::Pods),
        other => Err(ApiError::not_found(format!("unknown scheduling domain '{other}'"))),
    }
}

/// Build the Axum router with every route this adapter serves.
#[must_use]
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/schedule/{domain}/{pipeline}", post(schedule))
        .route("/status/{domain}/{pipeline}", get(pipeline_status))
        .route("/status/{domain}", get(domain_status))
        .with_state(state)
}

/// Prometheus text-exposition scrape endpoint: renders every tracked
/// pipeline's run and per-step metrics across every domain this process
/// serves.
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut body = String::new();
    for controller in state.controllers.values() {
        for name in controller.pipeline_names().await {
            let Some(pipeline) = controller.pipeline(&name).await else {
                continue;
            };
            body.push_str(&scheduler_runtime::render_pipeline_metrics(
                pipeline.name(),
                &pipeline.metrics(),
                &pipeline.step_metrics(),
            ));
        }
    }
    (
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "contract_version": scheduler_core::CONTRACT_VERSION,
        "time": Utc::now().to_rfc3339(),
    }))
}

async fn schedule(
    AxPath((domain, pipeline)): AxPath<(String, String)>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlacementRequestBody>,
) -> Result<Json<PlacementResponseBody>, ApiError> {
    let domain = parse_domain(&domain)?;
    let request = project_request(body)?;

    let controller = state.controller(domain).ok_or_else(|| {
        ApiError::service_unavailable(ErrorCode::PipelineNotReady, "no controller serves this domain")
    })?;
    let pipeline_handle = controller.pipeline(&pipeline).await.ok_or_else(|| {
        ApiError::service_unavailable(
            ErrorCode::PipelineNotReady,
            format!("pipeline '{pipeline}' is not currently Ready"),
        )
    })?;

    let token = CancellationToken::new();
    let deadline_guard = {
        let token = token.clone();
        let deadline = state.deadline;
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            token.cancel(CancellationReason::DeadlineExceeded);
        })
    };

    let result = pipeline_handle.run(&request, &token).await;
    deadline_guard.abort();

    match result {
        Ok(decision) => {
            info!(
                target: "scheduler.http",
                pipeline = %pipeline,
                hosts_in = request.subjects.len(),
                hosts_out = decision.ordered_hosts.len(),
                "schedule request served"
            );
            Ok(Json(PlacementResponseBody {
                hosts: decision.ordered_hosts,
            }))
        }
        Err(err) => {
            warn!(target: "scheduler.http", pipeline = %pipeline, error = %err, "schedule request failed");
            Err(ApiError::internal(err))
        }
    }
}

async fn pipeline_status(
    AxPath((domain, pipeline)): AxPath<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PipelineStatus>, ApiError> {
    let domain = parse_domain(&domain)?;
    let controller = state
        .controller(domain)
        .ok_or_else(|| ApiError::not_found("no controller serves this domain"))?;
    let status = controller
        .status(&pipeline)
        .await
        .ok_or_else(|| ApiError::not_found(format!("pipeline '{pipeline}' is not tracked")))?;
    Ok(Json(status))
}

async fn domain_status(
    AxPath(domain): AxPath<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PipelineStatus>>, ApiError> {
    let domain = parse_domain(&domain)?;
    let controller = state
        .controller(domain)
        .ok_or_else(|| ApiError::not_found("no controller serves this domain"))?;
    Ok(Json(controller.statuses().await))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(hosts: &[&str], weights: &[(&str, f64)]) -> PlacementRequestBody {
        PlacementRequestBody {
            spec: RequestAttributes::default(),
            rebuild: false,
            hosts: hosts
                .iter()
                .map(|h| HostEntry {
                    name: (*h).to_string(),
                    status: None,
                })
                .collect(),
            weights: weights.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
        }
    }

    #[test]
    fn rejects_rebuild_requests() {
        let mut b = body(&["h1"], &[("h1", 0.0)]);
        b.rebuild = true;
        let err = project_request(b).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, Some(ErrorCode::UnsupportedRebuild));
    }

    #[test]
    fn rejects_multi_instance_requests() {
        let mut b = body(&["h1"], &[("h1", 0.0)]);
        b.spec.num_instances = 2;
        let err = project_request(b).unwrap_err();
        assert_eq!(err.code, Some(ErrorCode::MultiInstanceUnsupported));
    }

    #[test]
    fn rejects_mismatched_weight_and_host_sets() {
        let b = body(&["h1", "h2"], &[("h1", 0.0)]);
        let err = project_request(b).unwrap_err();
        assert_eq!(err.code, Some(ErrorCode::SubjectWeightSetMismatch));
    }

    #[test]
    fn rejects_empty_subject_set() {
        let b = body(&[], &[]);
        let err = project_request(b).unwrap_err();
        assert_eq!(err.code, Some(ErrorCode::EmptySubjectSet));
    }

    #[test]
    fn accepts_matching_hosts_and_weights() {
        let b = body(&["h1", "h2"], &[("h1", 1.0), ("h2", 2.0)]);
        let request = project_request(b).unwrap();
        assert_eq!(request.subjects, vec!["h1", "h2"]);
        assert_eq!(request.weights.len(), 2);
        assert!(!request.attributes.rebuild);
    }

    #[test]
    fn carries_project_id_into_trace_log_args() {
        let mut b = body(&["h1"], &[("h1", 0.0)]);
        b.spec.project_id = Some("tenant-a".to_string());
        let request = project_request(b).unwrap();
        assert_eq!(request.trace_log_args.get("project_id"), Some(&"tenant-a".to_string()));
    }

    #[test]
    fn parse_domain_accepts_case_insensitive_names() {
        assert_eq!(parse_domain("Nova").unwrap(), SchedulingDomain::Nova);
        assert_eq!(parse_domain("CINDER").unwrap(), SchedulingDomain::Cinder);
        assert!(parse_domain("nonexistent").is_err());
    }

    mod app {
        use super::*;
        use crate::builtin::NoopStep;
        use axum::body::Body;
        use http_body_util::BodyExt;
        use scheduler_core::{PipelineConfig, PipelineType, StepConfig};
        use scheduler_controller::{ConfigEvent, PipelineController};
        use scheduler_runtime::StepRegistry;
        use tower::ServiceExt;

        async fn app() -> Router {
            let mut registry = StepRegistry::new();
            registry.register("noop", std::sync::Arc::new(|| Box::new(NoopStep::new()) as _));
            let controller = Arc::new(PipelineController::new(
                SchedulingDomain::Nova,
                PipelineType::FilterWeigher,
                Arc::new(registry),
                None,
            ));
            controller
                .handle_config_event(ConfigEvent::Upserted {
                    name: "nova-default".to_string(),
                    config: PipelineConfig {
                        scheduling_domain: SchedulingDomain::Nova,
                        pipeline_type: PipelineType::FilterWeigher,
                        filters: vec![],
                        weighers: vec![StepConfig {
                            name: "noop".to_string(),
                            step_impl: "noop".to_string(),
                            params: serde_json::json!({}),
                            multiplier: None,
                            disabled_validations: Default::default(),
                        }],
                        detectors: vec![],
                        description: None,
                        name: "nova-default".to_string(),
                    },
                })
                .await;

            let mut controllers = HashMap::new();
            controllers.insert(SchedulingDomain::Nova, controller);
            let state = Arc::new(AppState::new(controllers, Duration::from_secs(5)));
            build_app(state)
        }

        async fn json_body(response: Response) -> serde_json::Value {
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            serde_json::from_slice(&bytes).unwrap()
        }

        #[tokio::test]
        async fn health_reports_ok() {
            let response = app()
                .await
                .oneshot(axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            assert_eq!(body["status"], "ok");
        }

        #[tokio::test]
        async fn schedule_then_metrics_reflects_the_run() {
            let app = app().await;
            let request_body = serde_json::json!({
                "spec": {},
                "hosts": [{"name": "h1"}, {"name": "h2"}],
                "weights": {"h1": 1.0, "h2": 2.0},
            });
            let response = app
                .clone()
                .oneshot(
                    axum::http::Request::builder()
                        .method("POST")
                        .uri("/schedule/nova/nova-default")
                        .header("content-type", "application/json")
                        .body(Body::from(serde_json::to_vec(&request_body).unwrap()))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            let hosts = body["hosts"].as_array().unwrap();
            assert_eq!(hosts.len(), 2);

            let metrics_response = app
                .oneshot(axum::http::Request::builder().uri("/metrics").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(metrics_response.status(), StatusCode::OK);
            let bytes = metrics_response.into_body().collect().await.unwrap().to_bytes();
            let text = String::from_utf8(bytes.to_vec()).unwrap();
            assert!(text.contains("pipeline_requests_total{pipeline=\"nova-default\"} 1"));
            assert!(text.contains("pipeline_host_number_in{pipeline=\"nova-default\"} 2"));
            assert!(text.contains(
                "pipeline_step_run_duration_seconds_count{pipeline=\"nova-default\",step=\"noop\"} 1"
            ));
        }

        #[tokio::test]
        async fn unknown_pipeline_returns_service_unavailable() {
            let response = app()
                .await
                .oneshot(
                    axum::http::Request::builder()
                        .method("POST")
                        .uri("/schedule/nova/does-not-exist")
                        .header("content-type", "application/json")
                        .body(Body::from(
                            serde_json::to_vec(&serde_json::json!({
                                "spec": {},
                                "hosts": [{"name": "h1"}],
                                "weights": {"h1": 1.0},
                            }))
                            .unwrap(),
                        ))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }
}
