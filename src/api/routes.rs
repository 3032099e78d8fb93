//! API Route Configuration

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    compression::{
        predicate::{DefaultPredicate, NotForContentType, Predicate},
        CompressionLayer,
    },
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::handlers::{self, AppState};
use super::middleware::{logging_middleware, rate_limit_middleware};
use crate::models::ServerConfig;
use crate::utils::constants::NDJSON_CONTENT_TYPE;

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/check", post(handlers::check))
        .route("/check-stream", post(handlers::check_stream))
        .route("/start-check", post(handlers::start_check))
        .route("/result/:task_id", get(handlers::get_result));

    // Streams must reach the client line by line
    let compression = CompressionLayer::new()
        .compress_when(DefaultPredicate::new().and(NotForContentType::const_new(NDJSON_CONTENT_TYPE)));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health_check))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
        // Middleware (order matters - bottom runs first)
        .layer(compression)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.cors_origins))
        .layer(middleware::from_fn(logging_middleware))
        .layer(ConcurrencyLimitLayer::new(server.max_concurrent_requests.max(1)))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}
