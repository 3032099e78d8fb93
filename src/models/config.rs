//! Configuration module for PhishFinder
//!
//! `AppConfig` is built once at startup and shared read-only through `Arc`.
//! The only mutable shared state in the service (rate-limit counters, job
//! table) lives in `AppState`, never here.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::errors::{AppError, AppResult};
use super::types::ModelTier;
use crate::utils::constants::{
    DEFAULT_ALLOW_LIST, DEFAULT_FAST_MODEL, DEFAULT_LOOKUP_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_MAX_RUNNING_JOBS, DEFAULT_MAX_TRACKED_JOBS,
    DEFAULT_PORT, DEFAULT_RATE_LIMIT, DEFAULT_RETRY_BACKOFF, DEFAULT_THOROUGH_MODEL,
    FAST_TIER_TIMEOUT_SECS, GEMINI_BASE_URL, HTTP_SERVICE_UNAVAILABLE,
    THOROUGH_TIER_TIMEOUT_SECS,
};

/// When and how often an LLM call is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Upstream statuses that trigger another attempt
    pub retryable_statuses: Vec<u16>,
    /// Fixed delay between attempts
    pub backoff: Duration,
    /// Random jitter applied to the delay (± percent)
    pub jitter_percent: u64,
    /// Retry connection failures and timeouts
    pub retry_network_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retryable_statuses: vec![HTTP_SERVICE_UNAVAILABLE],
            backoff: DEFAULT_RETRY_BACKOFF,
            jitter_percent: 0,
            retry_network_errors: true,
        }
    }
}

impl RetryPolicy {
    /// Same policy without any sleeping between attempts
    pub fn immediate() -> Self {
        Self {
            backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

/// LLM connection settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub fast_model: String,
    pub thorough_model: String,
    pub fast_timeout: Duration,
    pub thorough_timeout: Duration,
    pub retry: RetryPolicy,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            thorough_model: DEFAULT_THOROUGH_MODEL.to_string(),
            fast_timeout: Duration::from_secs(FAST_TIER_TIMEOUT_SECS),
            thorough_timeout: Duration::from_secs(THOROUGH_TIER_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Thorough => &self.thorough_model,
        }
    }

    pub fn timeout_for(&self, tier: ModelTier) -> Duration {
        match tier {
            ModelTier::Fast => self.fast_timeout,
            ModelTier::Thorough => self.thorough_timeout,
        }
    }
}

/// Exact-match set of trusted domains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    domains: HashSet<String>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self::from_domains(DEFAULT_ALLOW_LIST.iter().copied())
    }
}

impl AllowList {
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Add comma-separated domains on top of the existing set
    pub fn extend_from_csv(&mut self, csv: &str) {
        self.domains.extend(
            csv.split(',')
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty()),
        );
    }

    #[inline]
    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests per client per sliding 60s window
    pub rate_limit: u32,
    pub max_concurrent_requests: usize,
    /// Empty means any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            rate_limit: DEFAULT_RATE_LIMIT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            cors_origins: Vec::new(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub allow_list: AllowList,
    /// Per-lookup timeout for registration and MX queries
    pub lookup_timeout: Duration,
    /// Root directory of the file audit sink; None disables archival
    pub audit_dir: Option<PathBuf>,
    pub max_running_jobs: usize,
    pub max_tracked_jobs: usize,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Config with defaults everywhere except the API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            llm: LlmConfig::new(api_key),
            allow_list: AllowList::default(),
            lookup_timeout: Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS),
            audit_dir: None,
            max_running_jobs: DEFAULT_MAX_RUNNING_JOBS,
            max_tracked_jobs: DEFAULT_MAX_TRACKED_JOBS,
            server: ServerConfig::default(),
        }
    }

    /// Load from the environment. Fails fast when the LLM key is missing.
    pub fn from_env() -> AppResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty() && k != "YOUR_API_KEY")
            .ok_or_else(|| AppError::missing_api_key("GEMINI_API_KEY"))?;
        info!("🔑 GEMINI_API_KEY configured (key hidden)");

        let mut config = Self::new(api_key);

        if let Ok(url) = std::env::var("GEMINI_API_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("PHISHFINDER_FAST_MODEL") {
            config.llm.fast_model = model;
        }
        if let Ok(model) = std::env::var("PHISHFINDER_THOROUGH_MODEL") {
            config.llm.thorough_model = model;
        }
        if let Ok(extra) = std::env::var("PHISHFINDER_ALLOW_LIST") {
            config.allow_list.extend_from_csv(&extra);
        }
        if let Some(secs) = parse_nonzero_env::<u64>("PHISHFINDER_LOOKUP_TIMEOUT_SECS")? {
            config.lookup_timeout = Duration::from_secs(secs);
        }
        if let Ok(dir) = std::env::var("PHISHFINDER_AUDIT_DIR") {
            config.audit_dir = Some(PathBuf::from(dir));
        } else {
            warn!("⚠️ PHISHFINDER_AUDIT_DIR not set. Audit archival disabled.");
        }
        // A zero limit would answer 429 to every request
        if let Some(limit) = parse_nonzero_env::<u32>("PHISHFINDER_RATE_LIMIT")? {
            config.server.rate_limit = limit;
        }
        if let Ok(host) = std::env::var("PHISHFINDER_HOST") {
            config.server.host = host;
        }
        // Hosting platforms inject PORT; PHISHFINDER_PORT is for local runs
        let port = match parse_env::<u16>("PORT")? {
            Some(port) => Some(port),
            None => parse_env::<u16>("PHISHFINDER_PORT")?,
        };
        if let Some(port) = port {
            config.server.port = port;
        }
        if let Ok(origins) = std::env::var("PHISHFINDER_CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        info!(
            allow_list = config.allow_list.len(),
            fast_model = %config.llm.fast_model,
            thorough_model = %config.llm.thorough_model,
            "Configuration loaded"
        );
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> AppResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::invalid_config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(None),
    }
}

fn parse_nonzero_env<T: std::str::FromStr + Default + PartialEq>(name: &str) -> AppResult<Option<T>> {
    match parse_env::<T>(name)? {
        Some(value) if value == T::default() => {
            Err(AppError::invalid_config(format!("{} must be greater than zero", name)))
        }
        other => Ok(other),
    }
}
