use std::{
    future::Future,
    time::{Duration, Instant},
};

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scenecast_api_types::{
    CompileRequest, CompileResponse, HealthResponse, HealthStatus, MergeRequest as MergeBody,
    MergeResponse,
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::{
    application::error::ErrorReport,
    domain::{
        error::DomainError,
        outcome::{Failure, FailureKind, MergeResult, RenderResult},
        request::{DEFAULT_ENTRY_POINT, MergeRequest, RenderRequest, parse_locations},
        types::Quality,
    },
};

use super::{AppState, RequestDefaults};

pub(super) async fn compile(
    State(state): State<AppState>,
    payload: Result<Json<CompileRequest>, JsonRejection>,
) -> Response {
    let request = match payload
        .map_err(Rejected::from)
        .and_then(|Json(body)| render_request(body, &state.defaults).map_err(Rejected::from))
    {
        Ok(request) => request,
        Err(rejected) => {
            return rejected.respond("infra::http::compile", CompileResponse::invalid);
        }
    };

    let started_at = Instant::now();
    let pipeline = state.render.clone();
    let result = run_bounded(state.defaults.request_timeout, "compile", async move {
        pipeline.render(&request).await
    })
    .await
    .unwrap_or_else(|failure| RenderResult::failed(failure, started_at.elapsed()));

    Json(CompileResponse::from(result)).into_response()
}

pub(super) async fn merge(
    State(state): State<AppState>,
    payload: Result<Json<MergeBody>, JsonRejection>,
) -> Response {
    let request = match payload
        .map_err(Rejected::from)
        .and_then(|Json(body)| merge_request(body, &state.defaults).map_err(Rejected::from))
    {
        Ok(request) => request,
        Err(rejected) => {
            return rejected.respond("infra::http::merge", MergeResponse::invalid);
        }
    };

    let started_at = Instant::now();
    let scene_count = request.locations().len();
    let pipeline = state.merge.clone();
    let result = run_bounded(state.defaults.request_timeout, "merge", async move {
        pipeline.merge(&request).await
    })
    .await
    .unwrap_or_else(|failure| MergeResult::failed(failure, started_at.elapsed(), scene_count));

    Json(MergeResponse::from(result)).into_response()
}

pub(super) async fn health(State(state): State<AppState>) -> Response {
    let report: HealthResponse = state.health.check().await;
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    let mut response = (status, Json(report)).into_response();
    if status != StatusCode::OK {
        ErrorReport::from_message(
            "infra::http::health",
            status,
            "renderer or ffmpeg did not answer the version probe",
        )
        .attach(&mut response);
    }
    response
}

fn render_request(
    body: CompileRequest,
    defaults: &RequestDefaults,
) -> Result<RenderRequest, DomainError> {
    let quality = match body.quality.as_deref() {
        Some(raw) => raw.parse::<Quality>()?,
        None => defaults.quality,
    };
    RenderRequest::new(
        body.python_code.unwrap_or_default(),
        body.class_name
            .unwrap_or_else(|| DEFAULT_ENTRY_POINT.to_string()),
        quality,
    )
}

fn merge_request(body: MergeBody, defaults: &RequestDefaults) -> Result<MergeRequest, DomainError> {
    let items = match body.video_urls {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(DomainError::validation("video_urls array is required")),
    };

    let raw = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_str().ok_or_else(|| {
                DomainError::validation(format!("video_urls[{index}] must be a string"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    MergeRequest::new(
        parse_locations(&raw, defaults.allow_file_locations)?,
        body.add_transitions.unwrap_or(false),
        body.transition_duration
            .unwrap_or(defaults.transition_seconds),
    )
}

/// Why a request never reached its pipeline.
enum Rejected {
    Body(JsonRejection),
    Invalid(DomainError),
}

impl From<JsonRejection> for Rejected {
    fn from(rejection: JsonRejection) -> Self {
        Rejected::Body(rejection)
    }
}

impl From<DomainError> for Rejected {
    fn from(error: DomainError) -> Self {
        Rejected::Invalid(error)
    }
}

impl Rejected {
    fn respond<T: serde::Serialize>(
        self,
        source: &'static str,
        envelope: impl FnOnce(String) -> T,
    ) -> Response {
        let status = StatusCode::BAD_REQUEST;
        let (message, report) = match self {
            Rejected::Body(rejection) => {
                let message = format!("invalid request body: {}", rejection.body_text());
                let report = ErrorReport::from_error(source, status, &rejection);
                (message, report)
            }
            Rejected::Invalid(error) => {
                let message = error.message().to_string();
                let report = ErrorReport::from_error(source, status, &error);
                (message, report)
            }
        };
        let mut response = (status, Json(envelope(message))).into_response();
        report.attach(&mut response);
        response
    }
}

/// Aborts the task when dropped, so an abandoned request stops its subprocess too.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run a pipeline on its own task, bounded by the request timeout.
async fn run_bounded<T, F>(limit: Duration, op: &'static str, task: F) -> Result<T, Failure>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut guard = AbortOnDrop(tokio::spawn(task));
    match tokio::time::timeout(limit, &mut guard.0).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => {
            error!(
                target = "infra::http",
                op,
                result = "error",
                error_code = FailureKind::Unexpected.as_str(),
                error = %join_error,
                "Pipeline task ended abnormally"
            );
            Err(Failure::new(
                FailureKind::Unexpected,
                format!("{op} task failed: {join_error}"),
            ))
        }
        Err(_) => {
            warn!(
                target = "infra::http",
                op,
                result = "timeout",
                error_code = FailureKind::Timeout.as_str(),
                limit_secs = limit.as_secs_f64(),
                "Request exceeded its time bound"
            );
            Err(Failure::new(
                FailureKind::Timeout,
                format!("{op} request exceeded {}s", limit.as_secs_f64()),
            ))
        }
    }
}
