//! Centralized Error Handling Module
//!
//! Every failure that can leave the pipeline carries a unique code so it can be
//! grepped in production logs and mapped to an HTTP status.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - INPUT_xxx: user-correctable request problems
//! - UPSTREAM_xxx: LLM service failures
//! - EVIDENCE_xxx: lookup failures (absorbed by the gatherer)
//! - CFG_xxx: configuration errors
//! - API_xxx / JOB_xxx / AUDIT_xxx: delivery-side errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// True for any failure attributed to the LLM service
    pub fn is_upstream(&self) -> bool {
        self.code.is_upstream()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Input Errors
    // ============================================
    /// Prompt missing or blank
    InputMissingPrompt,
    /// Unknown model tier selector
    InputInvalidModel,

    // ============================================
    // Upstream (LLM) Errors
    // ============================================
    /// Upstream answered "service temporarily unavailable"
    UpstreamUnavailable,
    /// Upstream answered with any other non-success status
    UpstreamStatus,
    /// Upstream call exceeded the tier timeout
    UpstreamTimeout,
    /// Connection-level failure talking to upstream
    UpstreamNetwork,
    /// Generated text was not a parseable verdict
    UpstreamMalformed,
    /// Response carried no candidates
    UpstreamNoCandidates,

    // ============================================
    // Evidence Errors (never propagated)
    // ============================================
    /// Registration or MX lookup failed
    EvidenceLookupFailed,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Missing API key
    ConfigMissingApiKey,
    /// Invalid configuration value
    ConfigInvalidValue,

    // ============================================
    // API / Delivery Errors
    // ============================================
    /// Resource not found
    ApiNotFound,
    /// Rate limit exceeded
    ApiRateLimited,
    /// Internal server error
    ApiInternalError,
    /// Background job capacity exhausted
    JobQueueFull,
    /// Audit sink could not persist a record
    AuditWriteFailed,

    // ============================================
    // Generic Errors
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputMissingPrompt => "INPUT_MISSING_PROMPT",
            Self::InputInvalidModel => "INPUT_INVALID_MODEL",

            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamStatus => "UPSTREAM_STATUS",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamNetwork => "UPSTREAM_NETWORK",
            Self::UpstreamMalformed => "UPSTREAM_MALFORMED",
            Self::UpstreamNoCandidates => "UPSTREAM_NO_CANDIDATES",

            Self::EvidenceLookupFailed => "EVIDENCE_LOOKUP_FAILED",

            Self::ConfigMissingApiKey => "CFG_MISSING_API_KEY",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::ApiNotFound => "API_NOT_FOUND",
            Self::ApiRateLimited => "API_RATE_LIMITED",
            Self::ApiInternalError => "API_INTERNAL_ERROR",
            Self::JobQueueFull => "JOB_QUEUE_FULL",
            Self::AuditWriteFailed => "AUDIT_WRITE_FAILED",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InputMissingPrompt | Self::InputInvalidModel => 400,
            Self::ApiNotFound => 404,
            Self::ApiRateLimited => 429,
            Self::UpstreamStatus | Self::UpstreamMalformed | Self::UpstreamNoCandidates => 502,
            Self::UpstreamUnavailable | Self::UpstreamNetwork | Self::JobQueueFull => 503,
            Self::UpstreamTimeout => 504,
            _ => 500,
        }
    }

    /// Check if error is worth another attempt under the default retry policy
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable | Self::UpstreamNetwork | Self::UpstreamTimeout
        )
    }

    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable
                | Self::UpstreamStatus
                | Self::UpstreamTimeout
                | Self::UpstreamNetwork
                | Self::UpstreamMalformed
                | Self::UpstreamNoCandidates
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Prompt missing or blank
    pub fn missing_prompt() -> Self {
        Self::new(ErrorCode::InputMissingPrompt, "Missing input")
    }

    /// Unknown model selector
    pub fn invalid_model(model: &str) -> Self {
        Self::new(
            ErrorCode::InputInvalidModel,
            format!("Unsupported model '{}'. Use 'flash' or 'pro'", model),
        )
    }

    /// Upstream 503
    pub fn upstream_unavailable() -> Self {
        Self::new(
            ErrorCode::UpstreamUnavailable,
            "LLM service temporarily unavailable (HTTP 503)",
        )
    }

    /// Upstream non-success status
    pub fn upstream_status(status: u16, body: &str) -> Self {
        let preview: String = body.chars().take(200).collect();
        Self::new(
            ErrorCode::UpstreamStatus,
            format!("LLM service returned HTTP {}: {}", status, preview),
        )
    }

    /// Upstream timeout
    pub fn upstream_timeout(secs: u64) -> Self {
        Self::new(
            ErrorCode::UpstreamTimeout,
            format!("LLM call timed out after {}s", secs),
        )
    }

    /// Upstream network failure
    pub fn upstream_network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamNetwork, msg)
    }

    /// Generated text could not be parsed
    pub fn malformed_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamMalformed, msg)
    }

    /// Evidence lookup failed
    pub fn lookup_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::EvidenceLookupFailed, msg)
    }

    /// Missing API key
    pub fn missing_api_key(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingApiKey,
            format!("Missing API key: {}", key_name),
        )
    }

    /// Invalid configuration value
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    /// Resource not found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiNotFound, msg)
    }

    /// API internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInternalError, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::UpstreamTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::UpstreamNetwork, "Connection failed")
        } else {
            Self::new(ErrorCode::UpstreamNetwork, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::UpstreamMalformed, "JSON parse error", err)
    }
}
