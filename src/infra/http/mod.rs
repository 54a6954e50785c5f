mod handlers;
mod middleware;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::{
    application::{health::HealthProbe, merge::MergePipeline, render::RenderPipeline},
    domain::types::Quality,
};

pub use middleware::REQUEST_ID_HEADER;

/// Shared handler state. Everything in here is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub render: Arc<RenderPipeline>,
    pub merge: Arc<MergePipeline>,
    pub health: Arc<HealthProbe>,
    pub defaults: RequestDefaults,
}

/// Values applied when a request omits optional fields, plus the per-request bound.
#[derive(Debug, Clone, Copy)]
pub struct RequestDefaults {
    pub quality: Quality,
    pub transition_seconds: f64,
    pub request_timeout: Duration,
    /// Mirrors `fetch.allow_file_locations`.
    pub allow_file_locations: bool,
}

pub fn build_router(state: AppState, max_request_bytes: usize) -> Router {
    Router::new()
        .route("/compile", post(handlers::compile))
        .route("/merge", post(handlers::merge))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
