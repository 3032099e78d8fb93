//! Core Module - Analysis Pipeline
//!
//! Classification, evidence, prompt construction, verdict normalization and
//! the delivery modes built on top of them.

pub mod classifier;
pub mod evidence;
pub mod jobs;
pub mod pipeline;
pub mod prompt;
pub mod risk_score;

pub use classifier::classify;
pub use evidence::{EvidenceGatherer, GatherOutcome};
pub use jobs::{InMemoryJobQueue, Job, JobQueue, JobState, JobWork};
pub use pipeline::{allow_listed_result, AnalysisPipeline, StreamEvent};
pub use prompt::{response_schema, MxRendering, PromptRequest, PromptVariant, RiskPromptBuilder};
pub use risk_score::{clamp_score, fallback_advice, VerdictBuilder};
