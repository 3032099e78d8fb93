//! API Request Handlers
//!
//! Thin adapters from HTTP onto the three delivery modes.

use axum::{
    body::{Body, Bytes},
    extract::{Json, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::middleware::RateLimiter;
use super::types::*;
use crate::core::jobs::{JobQueue, JobWork};
use crate::core::pipeline::{AnalysisPipeline, StreamEvent};
use crate::core::prompt::PromptVariant;
use crate::models::{AnalysisReport, AppError};
use crate::utils::constants::NDJSON_CONTENT_TYPE;

/// Shared application state
pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
    pub jobs: Arc<dyn JobQueue>,
    pub rate_limiter: Arc<RateLimiter>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<AnalysisPipeline>, jobs: Arc<dyn JobQueue>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            pipeline,
            jobs,
            rate_limiter,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        allow_list_size: state.pipeline.gatherer().allow_list().len(),
    };

    Json(ApiResponse::success(data, start.elapsed().as_secs_f64() * 1000.0))
}

// ============================================
// Synchronous / streaming check
// ============================================

/// `POST /api/check`: one JSON result, or NDJSON when the client asks for it
pub async fn check(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match CheckRequest::from_body(&body).into_analysis_request() {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    if wants_stream(&headers, &query) {
        let rx = AnalysisPipeline::stream(Arc::clone(&state.pipeline), request, PromptVariant::Full);
        return ndjson_response(rx);
    }

    match state.pipeline.analyze(&request).await {
        Ok(result) => Json(AnalysisReport::from(&result)).into_response(),
        Err(e) => {
            error!(code = e.code_str(), "🔥 Analysis failed in /api/check: {}", e);
            e.into_response()
        }
    }
}

/// `POST /api/check-stream`: always NDJSON
pub async fn check_stream(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match CheckRequest::from_body(&body).into_analysis_request() {
        Ok(request) => ndjson_response(AnalysisPipeline::stream(
            Arc::clone(&state.pipeline),
            request,
            PromptVariant::Full,
        )),
        Err(e) => e.into_response(),
    }
}

fn wants_stream(headers: &HeaderMap, query: &StreamQuery) -> bool {
    if query.stream.unwrap_or(false) {
        return true;
    }
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains(NDJSON_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Body that yields one line per event until the pipeline closes the channel
fn ndjson_response(rx: mpsc::Receiver<StreamEvent>) -> Response {
    let lines = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|event| (Ok::<_, Infallible>(Bytes::from(event.to_ndjson_line())), rx))
    });

    (
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}

// ============================================
// Submit-and-poll
// ============================================

/// `POST /api/start-check`
pub async fn start_check(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = match CheckRequest::from_body(&body).into_analysis_request() {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    let pipeline = Arc::clone(&state.pipeline);
    let work: JobWork = Box::pin(async move { pipeline.analyze(&request).await });

    match state.jobs.submit(work) {
        Ok(task_id) => {
            info!("📥 Job {} queued", task_id);
            (StatusCode::ACCEPTED, Json(StartCheckResponse::pending(task_id))).into_response()
        }
        Err(e) => {
            error!(code = e.code_str(), "Failed to queue job: {}", e);
            e.into_response()
        }
    }
}

/// `GET /api/result/:task_id`
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<JobStatusResponse>, AppError> {
    state
        .jobs
        .status(&task_id)
        .map(|job| Json(JobStatusResponse::from(&job)))
        .ok_or_else(|| AppError::not_found(format!("Unknown task id: {}", task_id)))
}
