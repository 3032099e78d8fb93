//! PhishFinder Library
//!
//! Phishing-risk analysis for URLs, domains, email addresses and raw email
//! source. Cheap local evidence is combined with a schema-constrained LLM
//! verdict:
//! - Allow-list short-circuit for trusted domains
//! - Domain registration date (RDAP, WHOIS fallback)
//! - Mail-exchange presence (DNS)
//! - Gemini risk verdict with retry and JSON recovery
//!
//! Results are delivered synchronously, as background jobs, or as an NDJSON
//! event stream.

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{
    classify, AnalysisPipeline, EvidenceGatherer, InMemoryJobQueue, JobQueue, JobState, PromptVariant,
    StreamEvent,
};
pub use models::{
    AnalysisReport, AnalysisRequest, AnalysisResult, AppConfig, AppError, AppResult, ErrorCode, ModelTier,
    RiskLevel,
};
pub use providers::{AuditSink, LlmClient, LlmTransport, MxLookup, RegistrationLookup};
