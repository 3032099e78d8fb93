//! API Middleware (Rate Limiting, Logging)

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::handlers::AppState;
use super::types::ErrorBody;
use crate::models::ErrorCode;
use crate::utils::constants::RATE_LIMIT_WINDOW;

/// Outcome of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Seconds until the oldest request leaves the window
    pub retry_after_secs: u64,
}

/// Sliding-window limiter keyed by client address.
/// Process-local and approximate; state resets on restart.
pub struct RateLimiter {
    requests: DashMap<String, VecDeque<Instant>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self::with_window(limit, RATE_LIMIT_WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut entry = self.requests.entry(key.to_string()).or_default();
        let timestamps = entry.value_mut();

        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() as u32 >= self.limit {
            let retry_after = timestamps
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return RateDecision {
                allowed: false,
                remaining: 0,
                retry_after_secs: retry_after.as_secs().max(1),
            };
        }

        timestamps.push_back(now);
        RateDecision {
            allowed: true,
            remaining: self.limit - timestamps.len() as u32,
            retry_after_secs: 0,
        }
    }

    /// Drop clients with no request inside the window
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        let window = self.window;
        self.requests.retain(|_, timestamps| {
            timestamps
                .back()
                .map(|newest| now.duration_since(*newest) < window)
                .unwrap_or(false)
        });
        before.saturating_sub(self.requests.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

/// Periodic sweep of idle rate-limit entries
pub fn start_cleanup_task(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_WINDOW);
        loop {
            interval.tick().await;
            let removed = limiter.cleanup();
            if removed > 0 {
                info!("🧹 Rate limiter cleanup: {} idle clients removed", removed);
            }
        }
    });
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket address
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    // Skip rate limiting for health check
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer);
    let decision = state.rate_limiter.check(&key);

    if !decision.allowed {
        warn!(key = %key, "🚫 Rate limit exceeded");
        let body = ErrorBody {
            error: format!(
                "Rate limit exceeded. Retry after {} seconds",
                decision.retry_after_secs
            ),
            code: ErrorCode::ApiRateLimited.as_str().to_string(),
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(decision.retry_after_secs));
        return response;
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        latency_ms = %start.elapsed().as_millis(),
        "Request completed"
    );

    response
}
