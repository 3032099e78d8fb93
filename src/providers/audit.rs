//! Audit Sink
//!
//! Archives every completed analysis and separately records high-confidence
//! threats. Writes happen off the request path; a failing sink is logged and
//! never changes what the caller receives.
//!
//! Layout of [`FileAuditSink`]:
//! - `phishfinder_results/{key}.json` - full report
//! - `high_confidence_threats/{key}.txt` - raw indicator, score >= 80 only

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{AnalysisReport, AnalysisResult, AppError, AppResult, ErrorCode};
use crate::utils::constants::HIGH_RISK_THRESHOLD;

const RESULTS_DIR: &str = "phishfinder_results";
const THREATS_DIR: &str = "high_confidence_threats";

/// Destination for audit records
pub trait AuditSink: Send + Sync {
    fn archive<'a>(&'a self, key: &'a str, report: &'a AnalysisReport) -> BoxFuture<'a, AppResult<()>>;

    fn record_threat<'a>(&'a self, key: &'a str, indicator: &'a str) -> BoxFuture<'a, AppResult<()>>;
}

/// Timestamp key, unique to the microsecond
pub fn audit_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d-%H%M%S-%6f").to_string()
}

/// Fire-and-forget archival of one result
pub fn dispatch(sink: Arc<dyn AuditSink>, result: &AnalysisResult) -> JoinHandle<()> {
    let key = audit_key(Utc::now());
    let report = AnalysisReport::from(result);
    let threat = (result.score() >= HIGH_RISK_THRESHOLD).then(|| result.raw_input.clone());

    tokio::spawn(async move {
        if let Err(e) = sink.archive(&key, &report).await {
            warn!(code = e.code_str(), "⚠️ Failed to archive analysis {}: {}", key, e);
        }
        if let Some(indicator) = threat {
            match sink.record_threat(&key, &indicator).await {
                Ok(()) => debug!("🚨 High-confidence threat recorded: {}", key),
                Err(e) => warn!(code = e.code_str(), "⚠️ Failed to record threat {}: {}", key, e),
            }
        }
    })
}

/// Local-filesystem sink
pub struct FileAuditSink {
    root: PathBuf,
}

impl FileAuditSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    async fn write(&self, dir: &str, file_name: String, contents: Vec<u8>) -> AppResult<()> {
        let dir = self.root.join(dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::with_source(ErrorCode::AuditWriteFailed, "Cannot create audit directory", e))?;
        tokio::fs::write(dir.join(file_name), contents)
            .await
            .map_err(|e| AppError::with_source(ErrorCode::AuditWriteFailed, "Cannot write audit record", e))
    }
}

impl AuditSink for FileAuditSink {
    fn archive<'a>(&'a self, key: &'a str, report: &'a AnalysisReport) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            let json = serde_json::to_vec_pretty(report)
                .map_err(|e| AppError::with_source(ErrorCode::AuditWriteFailed, "Cannot encode report", e))?;
            self.write(RESULTS_DIR, format!("{}.json", key), json).await
        })
    }

    fn record_threat<'a>(&'a self, key: &'a str, indicator: &'a str) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            self.write(THREATS_DIR, format!("{}.txt", key), indicator.as_bytes().to_vec())
                .await
        })
    }
}

/// Sink that drops everything; used when archival is not configured
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn archive<'a>(&'a self, _key: &'a str, _report: &'a AnalysisReport) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn record_threat<'a>(&'a self, _key: &'a str, _indicator: &'a str) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
