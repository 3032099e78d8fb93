//! Scripted fakes for every external collaborator of the pipeline

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use phishfinder::core::EvidenceGatherer;
use phishfinder::models::{AllowList, AnalysisReport, AppError, AppResult, LlmConfig, RetryPolicy};
use phishfinder::providers::{AuditSink, LlmClient, LlmTransport, MxLookup, RegistrationLookup, TransportResponse};
use phishfinder::AnalysisPipeline;

// ============================================
// LLM
// ============================================

pub struct ScriptedTransport {
    script: Mutex<VecDeque<AppResult<TransportResponse>>>,
    calls: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new(script: Vec<AppResult<TransportResponse>>) -> Arc<Self> {
        Self::delayed(script, Duration::ZERO)
    }

    /// Every answer arrives only after `delay`
    pub fn delayed(script: Vec<AppResult<TransportResponse>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            bodies: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompt text of the n-th request
    pub fn prompt(&self, n: usize) -> String {
        self.bodies.lock().unwrap()[n]["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }
}

impl LlmTransport for ScriptedTransport {
    fn generate<'a>(
        &'a self,
        _model: &'a str,
        body: &'a Value,
        _timeout: Duration,
    ) -> BoxFuture<'a, AppResult<TransportResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(body.clone());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TransportResponse::new(500, "script exhausted")));
        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            next
        })
    }
}

/// 200 response wrapping `verdict` as the generated text
pub fn gemini_ok(verdict: Value) -> AppResult<TransportResponse> {
    let envelope = json!({
        "candidates": [{ "content": { "parts": [{ "text": verdict.to_string() }] } }]
    });
    Ok(TransportResponse::new(200, envelope.to_string()))
}

pub fn unavailable() -> AppResult<TransportResponse> {
    Ok(TransportResponse::new(503, "The model is overloaded"))
}

pub fn high_risk_verdict() -> Value {
    json!({
        "risk_score": 92,
        "summary": "Sender domain was registered days ago and imitates a bank.",
        "watchFor": ["newly registered domain", "urgent payment request"],
        "advice": "Do not reply. Report the message.",
        "security_alert": "Phishing campaign from scam-domain.xyz",
        "social_post": "Watch out for emails from scam-domain.xyz"
    })
}

// ============================================
// Evidence
// ============================================

pub struct StaticRegistry {
    answer: Option<Vec<DateTime<Utc>>>,
    calls: AtomicUsize,
}

impl StaticRegistry {
    pub fn registered(year: i32, month: u32, day: u32) -> Arc<Self> {
        let date = Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap();
        Arc::new(Self {
            answer: Some(vec![date]),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RegistrationLookup for StaticRegistry {
    fn creation_dates<'a>(&'a self, _domain: &'a str) -> BoxFuture<'a, AppResult<Vec<DateTime<Utc>>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .answer
            .clone()
            .ok_or_else(|| AppError::lookup_failed("registry timeout"));
        Box::pin(async move { answer })
    }
}

pub struct StaticMx {
    answer: Option<bool>,
    calls: AtomicUsize,
}

impl StaticMx {
    pub fn present() -> Arc<Self> {
        Self::with(Some(true))
    }

    pub fn failing() -> Arc<Self> {
        Self::with(None)
    }

    fn with(answer: Option<bool>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MxLookup for StaticMx {
    fn has_mx<'a>(&'a self, _domain: &'a str) -> BoxFuture<'a, AppResult<bool>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer.ok_or_else(|| AppError::lookup_failed("SERVFAIL"));
        Box::pin(async move { answer })
    }
}

// ============================================
// Audit
// ============================================

#[derive(Default)]
pub struct RecordingAuditSink {
    pub archived: Mutex<Vec<AnalysisReport>>,
    pub threats: Mutex<Vec<String>>,
}

impl RecordingAuditSink {
    /// Wait for the fire-and-forget writes to land
    pub async fn wait_for_archives(&self, count: usize) -> Vec<AnalysisReport> {
        for _ in 0..200 {
            let archived = self.archived.lock().unwrap().clone();
            if archived.len() >= count {
                return archived;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.archived.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn archive<'a>(&'a self, _key: &'a str, report: &'a AnalysisReport) -> BoxFuture<'a, AppResult<()>> {
        self.archived.lock().unwrap().push(report.clone());
        Box::pin(async { Ok(()) })
    }

    fn record_threat<'a>(&'a self, _key: &'a str, indicator: &'a str) -> BoxFuture<'a, AppResult<()>> {
        self.threats.lock().unwrap().push(indicator.to_string());
        Box::pin(async { Ok(()) })
    }
}

// ============================================
// Wiring
// ============================================

pub struct Harness {
    pub pipeline: Arc<AnalysisPipeline>,
    pub transport: Arc<ScriptedTransport>,
    pub registry: Arc<StaticRegistry>,
    pub mx: Arc<StaticMx>,
    pub audit: Arc<RecordingAuditSink>,
}

pub fn harness_with(
    script: Vec<AppResult<TransportResponse>>,
    registry: Arc<StaticRegistry>,
    mx: Arc<StaticMx>,
) -> Harness {
    harness_with_transport(ScriptedTransport::new(script), registry, mx)
}

pub fn harness_with_transport(
    transport: Arc<ScriptedTransport>,
    registry: Arc<StaticRegistry>,
    mx: Arc<StaticMx>,
) -> Harness {
    let audit = Arc::new(RecordingAuditSink::default());

    let mut llm_config = LlmConfig::new("test-key");
    llm_config.retry = RetryPolicy::immediate();

    let gatherer = EvidenceGatherer::new(
        AllowList::default(),
        registry.clone(),
        mx.clone(),
        Duration::from_millis(500),
    );
    let llm = LlmClient::new(transport.clone(), llm_config);
    let pipeline = Arc::new(AnalysisPipeline::new(gatherer, llm, audit.clone()));

    Harness {
        pipeline,
        transport,
        registry,
        mx,
        audit,
    }
}

pub fn harness(script: Vec<AppResult<TransportResponse>>) -> Harness {
    harness_with(script, StaticRegistry::registered(2024, 5, 1), StaticMx::present())
}
