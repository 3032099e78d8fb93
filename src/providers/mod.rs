//! Providers Module - External Data Sources
//!
//! Everything that talks to the outside world: the Gemini LLM, domain
//! registries, DNS and the audit archive. Each sits behind a trait so the
//! pipeline can be driven by fakes.

pub mod audit;
pub mod dns;
pub mod gemini;
pub mod registry;

pub use audit::{AuditSink, FileAuditSink, NoopAuditSink};
pub use dns::{DnsMxLookup, MxLookup};
pub use gemini::{GeminiTransport, LlmClient, LlmTransport, TransportResponse};
pub use registry::{RegistrationLookup, RegistryClient};
