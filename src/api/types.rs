//! API Request/Response Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::core::jobs::{Job, JobState};
use crate::models::{AnalysisReport, AnalysisRequest, AppError, AppResult, ErrorCode};
use crate::utils::constants::GENERIC_ANALYSIS_ERROR;

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// `{"error": ..., "code": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Upstream and internal detail stays in the logs
        let error = match self.code {
            ErrorCode::InputMissingPrompt
            | ErrorCode::InputInvalidModel
            | ErrorCode::ApiNotFound
            | ErrorCode::ApiRateLimited
            | ErrorCode::JobQueueFull => self.message,
            _ => GENERIC_ANALYSIS_ERROR.to_string(),
        };

        let body = ErrorBody {
            error,
            code: self.code.as_str().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================
// Analysis
// ============================================

/// `{prompt, model?}`; every field optional so a bad body becomes "Missing input"
#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl CheckRequest {
    /// Lenient parse of a raw body
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    pub fn into_analysis_request(self) -> AppResult<AnalysisRequest> {
        AnalysisRequest::from_wire(self.prompt.as_deref(), self.model.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub stream: Option<bool>,
}

// ============================================
// Jobs
// ============================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StartCheckResponse {
    pub status: String,
    pub task_id: String,
}

impl StartCheckResponse {
    pub fn pending(task_id: String) -> Self {
        Self {
            status: "pending".to_string(),
            task_id,
        }
    }
}

/// `{state, data}` on success, `{state, status}` otherwise
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        let state = job.state.wire_state().to_string();
        match job.state {
            JobState::Succeeded => Self {
                state,
                data: job.result.as_ref().map(AnalysisReport::from),
                status: None,
            },
            JobState::Failed => Self {
                state,
                data: None,
                status: Some(job.error.clone().unwrap_or_else(|| "Analysis failed".to_string())),
            },
            JobState::Pending | JobState::Running => Self {
                state,
                data: None,
                status: Some("Processing...".to_string()),
            },
        }
    }
}

// ============================================
// Health
// ============================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub allow_list_size: usize,
}
