//! Gemini LLM Client
//!
//! Sends schema-constrained `generateContent` requests and turns the generated
//! text into a [`RiskVerdict`].
//!
//! Retry behaviour is driven by [`RetryPolicy`]; the default reproduces the
//! production behaviour exactly:
//! 1. At most two attempts
//! 2. Retry only on HTTP 503 or a network-level failure
//! 3. Fixed 1s pause between attempts
//! 4. Any other non-success status fails immediately
//!
//! The HTTP hop sits behind [`LlmTransport`] so the retry logic can be driven
//! by scripted transports in tests.

use futures_util::future::BoxFuture;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::prompt::PromptRequest;
use crate::core::risk_score::{clamp_score, VerdictBuilder};
use crate::models::{AppError, AppResult, ErrorCode, LlmConfig, ModelTier, RetryPolicy, RiskVerdict};
use crate::utils::constants::{HTTP_SERVICE_UNAVAILABLE, USER_AGENT as USER_AGENT_CONST};

// ============================================
// Transport
// ============================================

/// Raw upstream answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP round-trip to the LLM service
pub trait LlmTransport: Send + Sync {
    /// Network failures are reported as `UpstreamNetwork` / `UpstreamTimeout`
    fn generate<'a>(
        &'a self,
        model: &'a str,
        body: &'a Value,
        timeout: Duration,
    ) -> BoxFuture<'a, AppResult<TransportResponse>>;
}

/// reqwest-backed transport for the Gemini REST API
pub struct GeminiTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiTransport {
    pub fn new(config: &LlmConfig) -> AppResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::missing_api_key("GEMINI_API_KEY"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

impl LlmTransport for GeminiTransport {
    fn generate<'a>(
        &'a self,
        model: &'a str,
        body: &'a Value,
        timeout: Duration,
    ) -> BoxFuture<'a, AppResult<TransportResponse>> {
        Box::pin(async move {
            let url = format!("{}/{}:generateContent", self.base_url, model);

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .timeout(timeout)
                .json(body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        AppError::upstream_timeout(timeout.as_secs())
                    } else {
                        AppError::upstream_network(format!("Gemini request failed: {}", e))
                    }
                })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| AppError::upstream_network(format!("Failed to read Gemini body: {}", e)))?;

            Ok(TransportResponse { status, body })
        })
    }
}

// ============================================
// Client
// ============================================

/// LLM client with tier selection, timeout and retry
#[derive(Clone)]
pub struct LlmClient {
    transport: Arc<dyn LlmTransport>,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(transport: Arc<dyn LlmTransport>, config: LlmConfig) -> Self {
        Self { transport, config }
    }

    /// Client talking to the real Gemini API
    pub fn gemini(config: LlmConfig) -> AppResult<Self> {
        let transport = GeminiTransport::new(&config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry
    }

    /// Issue the request, retrying per policy, and parse the verdict
    pub async fn invoke(&self, prompt: &PromptRequest, tier: ModelTier) -> AppResult<RiskVerdict> {
        let model = self.config.model_for(tier);
        let timeout = self.config.timeout_for(tier);
        let policy = &self.config.retry;
        let body = request_body(prompt);
        let max_attempts = policy.max_attempts.max(1);

        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = backoff_delay(policy);
                debug!("⏳ Retry {}/{} after {}ms", attempt, max_attempts, delay.as_millis());
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let outcome = match tokio::time::timeout(timeout, self.transport.generate(model, &body, timeout)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::upstream_timeout(timeout.as_secs())),
            };

            match outcome {
                Ok(response) if response.is_success() => {
                    info!(model = %model, attempt, "🤖 LLM responded");
                    return parse_response(&response.body);
                }
                Ok(response) if policy.is_retryable_status(response.status) => {
                    warn!(
                        model = %model,
                        status = response.status,
                        "⚠️ LLM service unavailable (attempt {}/{})",
                        attempt,
                        max_attempts
                    );
                    last_error = Some(if response.status == HTTP_SERVICE_UNAVAILABLE {
                        AppError::upstream_unavailable()
                    } else {
                        AppError::upstream_status(response.status, &response.body)
                    });
                }
                Ok(response) => {
                    warn!(model = %model, status = response.status, "LLM returned non-retryable status");
                    return Err(AppError::upstream_status(response.status, &response.body));
                }
                Err(e) if policy.retry_network_errors && e.code.is_retryable() => {
                    warn!(
                        model = %model,
                        error = %e,
                        "🔥 Network error calling LLM (attempt {}/{})",
                        attempt,
                        max_attempts
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::new(
                ErrorCode::UpstreamUnavailable,
                format!("No successful LLM response after {} attempts", max_attempts),
            )
        }))
    }
}

fn backoff_delay(policy: &RetryPolicy) -> Duration {
    let base = policy.backoff.as_millis() as u64;
    if base == 0 || policy.jitter_percent == 0 {
        return policy.backoff;
    }
    let jitter_range = (base * policy.jitter_percent) / 100;
    let jitter: i64 = rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64));
    Duration::from_millis((base as i64 + jitter).max(0) as u64)
}

/// Gemini request body with the response schema attached
pub fn request_body(prompt: &PromptRequest) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt.text }] }],
        "generationConfig": {
            "response_mime_type": "application/json",
            "response_schema": prompt.schema,
        }
    })
}

// ============================================
// Response parsing
// ============================================

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Fields as the model produced them; anything may be missing
#[derive(Debug, Default, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    risk_score: Option<Value>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, rename = "watchFor")]
    watch_for: Option<Value>,
    #[serde(default)]
    advice: Option<String>,
    #[serde(default)]
    security_alert: Option<String>,
    #[serde(default)]
    social_post: Option<String>,
}

/// Pull the generated text out of a `generateContent` envelope and parse it
pub fn parse_response(body: &str) -> AppResult<RiskVerdict> {
    let envelope: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| AppError::malformed_response(format!("Unreadable LLM envelope: {}", e)))?;

    let text = envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| AppError::new(ErrorCode::UpstreamNoCandidates, "No valid candidates in LLM response"))?;

    parse_verdict(&text)
}

/// Parse generated text into a verdict, recovering JSON wrapped in prose or fences
pub fn parse_verdict(text: &str) -> AppResult<RiskVerdict> {
    // Only a top-level object is a verdict; arrays must not fill the struct by position
    let object = match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            let candidate = extract_json_object(text)
                .ok_or_else(|| AppError::malformed_response("LLM output contains no JSON object"))?;
            debug!("Recovered embedded JSON object from LLM output");
            match serde_json::from_str::<Value>(candidate) {
                Ok(value @ Value::Object(_)) => value,
                Ok(_) => return Err(AppError::malformed_response("Embedded JSON is not an object")),
                Err(e) => {
                    return Err(AppError::malformed_response(format!("Embedded JSON is unreadable: {}", e)))
                }
            }
        }
    };

    let raw: RawVerdict = serde_json::from_value(object)
        .map_err(|e| AppError::malformed_response(format!("LLM output does not match schema: {}", e)))?;

    let score = raw.risk_score.as_ref().and_then(score_from_value).unwrap_or(0);

    let mut builder = VerdictBuilder::new(score).watch_for(watch_for_from_value(raw.watch_for));
    if let Some(summary) = raw.summary {
        builder = builder.summary(summary);
    }
    if let Some(advice) = raw.advice {
        builder = builder.advice(advice);
    }
    Ok(builder.generated(raw.security_alert, raw.social_post).build())
}

fn score_from_value(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(clamp_score),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| clamp_score(f.round() as i64)),
        _ => None,
    }
}

fn watch_for_from_value(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    }
}

/// First balanced `{...}` substring, ignoring braces inside string literals
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
