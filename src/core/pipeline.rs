//! Analysis Pipeline
//!
//! classify → gather → (allow-list short-circuit OR build + invoke) → normalize
//!
//! Two entry points share the same components:
//! - [`AnalysisPipeline::analyze`]: one complete [`AnalysisResult`]
//!   (synchronous mode, also what background jobs execute)
//! - [`AnalysisPipeline::stream`]: ordered [`StreamEvent`]s as stages finish
//!
//! Every completed analysis is handed to the audit sink off the request path.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::core::classifier::classify;
use crate::core::evidence::{EvidenceGatherer, GatherOutcome};
use crate::core::prompt::{MxRendering, PromptVariant, RiskPromptBuilder};
use crate::core::risk_score::VerdictBuilder;
use crate::models::{
    AnalysisReport, AnalysisRequest, AnalysisResult, AnalysisTarget, AppConfig, AppResult, Evidence,
    GeneratedContent, RiskBlock,
};
use crate::providers::audit::{self, AuditSink, FileAuditSink, NoopAuditSink};
use crate::providers::dns::DnsMxLookup;
use crate::providers::gemini::LlmClient;
use crate::providers::registry::RegistryClient;
use crate::utils::constants::{GENERIC_ANALYSIS_ERROR, NOT_APPLICABLE};

const STREAM_BUFFER: usize = 16;

// ============================================
// Stream events
// ============================================

/// One NDJSON line: `{"type": ..., "content": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "camelCase")]
pub enum StreamEvent {
    DomainAge(String),
    MxRecords(String),
    Risk(RiskBlock),
    Summary(String),
    WatchFor(String),
    Advice(String),
    Generated(GeneratedContent),
    /// Allow-list hit: the whole synthesized result at once
    Final(AnalysisReport),
    Error(String),
}

impl StreamEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            StreamEvent::DomainAge(_) => "domainAge",
            StreamEvent::MxRecords(_) => "mxRecords",
            StreamEvent::Risk(_) => "risk",
            StreamEvent::Summary(_) => "summary",
            StreamEvent::WatchFor(_) => "watchFor",
            StreamEvent::Advice(_) => "advice",
            StreamEvent::Generated(_) => "generated",
            StreamEvent::Final(_) => "final",
            StreamEvent::Error(_) => "error",
        }
    }

    /// Serialized event followed by a newline
    pub fn to_ndjson_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"type":"error","content":"{}"}}"#, GENERIC_ANALYSIS_ERROR)
        });
        line.push('\n');
        line
    }
}

/// Result synthesized for allow-listed targets; the LLM is never consulted
pub fn allow_listed_result(target: AnalysisTarget, raw_input: &str, variant: PromptVariant) -> AnalysisResult {
    let generated = match variant {
        PromptVariant::Full => (Some(NOT_APPLICABLE.to_string()), Some(NOT_APPLICABLE.to_string())),
        PromptVariant::Basic => (None, None),
    };
    let verdict = VerdictBuilder::new(0)
        .summary(format!("The domain '{}' is a known, trusted entity.", target.domain))
        .watch_for(vec!["This domain is on our internal allow-list of trusted sites.".to_string()])
        .advice("This site is considered safe.")
        .generated(generated.0, generated.1)
        .build();

    AnalysisResult {
        target,
        evidence: Evidence::not_applicable(),
        verdict,
        raw_input: raw_input.to_string(),
        allow_listed: true,
    }
}

// ============================================
// Pipeline
// ============================================

pub struct AnalysisPipeline {
    gatherer: EvidenceGatherer,
    llm: LlmClient,
    audit: Arc<dyn AuditSink>,
}

impl AnalysisPipeline {
    pub fn new(gatherer: EvidenceGatherer, llm: LlmClient, audit: Arc<dyn AuditSink>) -> Self {
        Self { gatherer, llm, audit }
    }

    /// Wire up the production collaborators
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let registry = Arc::new(RegistryClient::new(config.lookup_timeout)?);
        let mx = Arc::new(DnsMxLookup::from_system_conf());
        let gatherer = EvidenceGatherer::new(config.allow_list.clone(), registry, mx, config.lookup_timeout);
        let llm = LlmClient::gemini(config.llm.clone())?;
        let audit: Arc<dyn AuditSink> = match &config.audit_dir {
            Some(dir) => {
                info!("🗄️ Audit archive enabled at {}", dir.display());
                Arc::new(FileAuditSink::new(dir))
            }
            None => Arc::new(NoopAuditSink),
        };
        Ok(Self::new(gatherer, llm, audit))
    }

    pub fn gatherer(&self) -> &EvidenceGatherer {
        &self.gatherer
    }

    /// Periodic housekeeping for the lookup caches
    pub fn sweep_caches(&self) -> usize {
        let removed = self.gatherer.sweep_caches();
        if removed > 0 {
            info!("🧹 Swept {} stale registry answers", removed);
        }
        removed
    }

    /// Run the full pipeline and return one complete result
    pub async fn analyze(&self, request: &AnalysisRequest) -> AppResult<AnalysisResult> {
        let start = Instant::now();
        let raw_input = request.raw_input();
        let target = classify(raw_input);
        debug!(domain = %target.domain, kind = target.kind.as_str(), "Classified indicator");

        let result = match self.gatherer.gather(&target).await {
            GatherOutcome::AllowListed => {
                info!("✅ {} is allow-listed, skipping LLM", target.domain);
                allow_listed_result(target, raw_input, PromptVariant::Full)
            }
            GatherOutcome::Gathered(evidence) => {
                let prompt = RiskPromptBuilder::new(PromptVariant::Full).build(
                    raw_input,
                    &target,
                    &evidence,
                    MxRendering::Binary,
                );
                let verdict = self.llm.invoke(&prompt, request.tier()).await?;
                AnalysisResult {
                    target,
                    evidence,
                    verdict,
                    raw_input: raw_input.to_string(),
                    allow_listed: false,
                }
            }
        };

        info!(
            latency_ms = start.elapsed().as_millis() as u64,
            "🔍 Analysis complete: {}",
            result.summary_line()
        );
        self.archive(&result);
        Ok(result)
    }

    /// Start a streaming analysis; events arrive on the returned receiver
    pub fn stream(pipeline: Arc<Self>, request: AnalysisRequest, variant: PromptVariant) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            pipeline.stream_into(&request, variant, &tx).await;
        });
        rx
    }

    /// Emit events for one analysis into `tx`. Stops quietly once the receiver is gone.
    pub async fn stream_into(&self, request: &AnalysisRequest, variant: PromptVariant, tx: &mpsc::Sender<StreamEvent>) {
        let start = Instant::now();
        match self.run_streaming(request, variant, tx).await {
            Ok(Some(result)) => {
                info!(
                    latency_ms = start.elapsed().as_millis() as u64,
                    "📡 Streamed analysis complete: {}",
                    result.summary_line()
                );
                self.archive(&result);
            }
            Ok(None) => debug!("Stream client disconnected, stopping emission"),
            Err(e) => {
                error!(code = e.code_str(), "❌ Streaming analysis failed: {}", e);
                let _ = tx.send(StreamEvent::Error(GENERIC_ANALYSIS_ERROR.to_string())).await;
            }
        }
    }

    /// `Ok(None)` means the receiver went away mid-stream
    async fn run_streaming(
        &self,
        request: &AnalysisRequest,
        variant: PromptVariant,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> AppResult<Option<AnalysisResult>> {
        let raw_input = request.raw_input();
        let target = classify(raw_input);

        if self.gatherer.is_allow_listed(&target) {
            info!("✅ {} is allow-listed, skipping LLM", target.domain);
            let result = allow_listed_result(target, raw_input, variant);
            let event = StreamEvent::Final(AnalysisReport::from(&result));
            return Ok(emit(tx, event).await.then_some(result));
        }

        // Age is pushed as soon as it resolves; MX keeps running meanwhile
        let ((creation_date, age_sent), mx) = tokio::join!(
            async {
                let creation_date = self.gatherer.creation_date(&target).await;
                let sent = emit(tx, StreamEvent::DomainAge(creation_date.as_str().to_string())).await;
                (creation_date, sent)
            },
            self.gatherer.mx_presence(&target),
        );
        if !age_sent {
            return Ok(None);
        }
        let evidence = Evidence { creation_date, mx };
        if !emit(tx, StreamEvent::MxRecords(MxRendering::Ternary.render(&evidence).to_string())).await {
            return Ok(None);
        }

        let prompt = RiskPromptBuilder::new(variant).build(raw_input, &target, &evidence, MxRendering::Ternary);
        let verdict = self.llm.invoke(&prompt, request.tier()).await?;

        let mut events = vec![
            StreamEvent::Risk(RiskBlock::from(&verdict)),
            StreamEvent::Summary(verdict.summary.clone()),
        ];
        events.extend(verdict.watch_for.iter().cloned().map(StreamEvent::WatchFor));
        events.push(StreamEvent::Advice(verdict.advice.clone()));
        if variant == PromptVariant::Full {
            if let Some(generated) = &verdict.generated {
                events.push(StreamEvent::Generated(generated.clone()));
            }
        }

        for event in events {
            if !emit(tx, event).await {
                return Ok(None);
            }
        }

        Ok(Some(AnalysisResult {
            target,
            evidence,
            verdict,
            raw_input: raw_input.to_string(),
            allow_listed: false,
        }))
    }

    fn archive(&self, result: &AnalysisResult) {
        audit::dispatch(Arc::clone(&self.audit), result);
    }
}

async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    tx.send(event).await.is_ok()
}
