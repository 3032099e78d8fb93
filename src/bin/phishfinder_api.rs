//! PhishFinder API Server
//!
//! Usage:
//!   cargo run --bin phishfinder_api
//!
//! Environment:
//!   GEMINI_API_KEY        - Required
//!   PORT / PHISHFINDER_PORT - Server port (default: 10000)
//!   PHISHFINDER_HOST      - Server host (default: 0.0.0.0)
//!   PHISHFINDER_AUDIT_DIR - Enables result archival
//!   RUST_LOG              - Log filter (default: info)

use phishfinder::api::{create_router, start_cleanup_task, AppState, RateLimiter};
use phishfinder::{AnalysisPipeline, AppConfig, InMemoryJobQueue};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    print_banner();

    let config = AppConfig::from_env()?;
    let pipeline = Arc::new(AnalysisPipeline::from_config(&config)?);

    let jobs = Arc::new(InMemoryJobQueue::new(config.max_running_jobs, config.max_tracked_jobs));
    let jobs_for_cleanup = jobs.clone();
    let pipeline_for_cleanup = pipeline.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            jobs_for_cleanup.cleanup_expired();
            pipeline_for_cleanup.sweep_caches();
        }
    });

    let rate_limiter = Arc::new(RateLimiter::new(config.server.rate_limit));
    start_cleanup_task(rate_limiter.clone());
    info!("🧹 Background cleanup tasks started");

    let state = Arc::new(AppState::new(pipeline, jobs, rate_limiter));
    let app = create_router(state, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    info!("🚀 PhishFinder API starting on http://{}", addr);
    info!("");
    info!("Endpoints:");
    info!("  POST /api/check          - Synchronous analysis (NDJSON with Accept: application/x-ndjson)");
    info!("  POST /api/check-stream   - Streaming analysis (NDJSON)");
    info!("  POST /api/start-check    - Queue a background analysis");
    info!("  GET  /api/result/:id     - Poll a background analysis");
    info!("  GET  /health             - Health check");
    info!("");
    info!("Press Ctrl+C for graceful shutdown");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("🛑 PhishFinder API shutdown complete");
    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ==============================================================
        P H I S H F I N D E R   A P I   v{}
        Domain evidence + LLM phishing-risk verdicts
    ==============================================================
    "#,
        env!("CARGO_PKG_VERSION")
    );
}
