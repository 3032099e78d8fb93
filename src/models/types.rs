//! Type definitions for PhishFinder
//! All core data structures flowing through the analysis pipeline

use serde::{Deserialize, Serialize};

use super::errors::{AppError, AppResult};
use crate::utils::constants::{
    CREATION_DATE_UNAVAILABLE, MX_UNKNOWN, NOT_APPLICABLE, RAW_EMAIL_SENTINEL,
};

// ============================================
// Request
// ============================================

/// Caller-selected LLM quality/cost level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    #[default]
    Fast,
    Thorough,
}

impl ModelTier {
    /// Parse the wire selector (`flash` | `pro`, also accepts `fast` | `thorough`)
    pub fn from_selector(selector: &str) -> AppResult<Self> {
        match selector.trim().to_ascii_lowercase().as_str() {
            "flash" | "fast" => Ok(Self::Fast),
            "pro" | "thorough" => Ok(Self::Thorough),
            other => Err(AppError::invalid_model(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Thorough => "thorough",
        }
    }
}

/// A validated analysis request. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    raw_input: String,
    tier: ModelTier,
}

impl AnalysisRequest {
    /// Trims the input and rejects blank prompts
    pub fn new(raw_input: impl Into<String>, tier: ModelTier) -> AppResult<Self> {
        let raw_input = raw_input.into().trim().to_string();
        if raw_input.is_empty() {
            return Err(AppError::missing_prompt());
        }
        Ok(Self { raw_input, tier })
    }

    /// Build from the optional wire fields `{prompt, model}`
    pub fn from_wire(prompt: Option<&str>, model: Option<&str>) -> AppResult<Self> {
        let tier = match model {
            Some(m) if !m.trim().is_empty() => ModelTier::from_selector(m)?,
            _ => ModelTier::default(),
        };
        Self::new(prompt.unwrap_or_default(), tier)
    }

    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    pub fn tier(&self) -> ModelTier {
        self.tier
    }
}

// ============================================
// Target
// ============================================

/// What kind of indicator the user submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Email,
    UrlOrDomain,
    RawEmailSource,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::UrlOrDomain => "url_or_domain",
            Self::RawEmailSource => "raw_email_source",
        }
    }

    /// Steering text embedded in the prompt
    pub fn context_hint(&self) -> &'static str {
        match self {
            Self::Email => {
                "The input is an email address. Focus on the sender domain's legitimacy, \
                 lookalike spellings of known brands, and whether the domain can receive mail."
            }
            Self::UrlOrDomain => {
                "The input is a URL or domain. Focus on typosquatting, suspicious TLDs, \
                 deceptive subdomains or paths, and how recently the domain was registered."
            }
            Self::RawEmailSource => {
                "The input is raw email source including headers. Pay close attention to \
                 authentication headers (SPF, DKIM, DMARC results), Received chains, \
                 Reply-To and From mismatches, and urgent or credential-harvesting language."
            }
        }
    }
}

/// The normalized domain derived from an indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTarget {
    pub domain: String,
    pub kind: TargetKind,
}

impl AnalysisTarget {
    pub fn new(domain: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            domain: domain.into(),
            kind,
        }
    }

    /// False only for raw email source whose sender could not be extracted
    pub fn has_resolvable_domain(&self) -> bool {
        !(self.kind == TargetKind::RawEmailSource && self.domain == RAW_EMAIL_SENTINEL)
    }
}

// ============================================
// Evidence
// ============================================

/// Registration date evidence; absence is a first-class state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationDate {
    /// `YYYY-MM-DD`
    Known(String),
    Unavailable,
    /// Allow-listed target, no lookup performed
    NotApplicable,
}

impl CreationDate {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(date) => date,
            Self::Unavailable => CREATION_DATE_UNAVAILABLE,
            Self::NotApplicable => NOT_APPLICABLE,
        }
    }
}

/// Mail-exchange evidence. A negative answer is different from an inconclusive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MxPresence {
    Present,
    Absent,
    Unknown,
    NotApplicable,
}

impl MxPresence {
    /// Ternary rendering used by the streaming mode
    pub fn as_ternary(&self) -> &'static str {
        match self {
            Self::Present => "Yes",
            Self::Absent => "No",
            Self::Unknown => MX_UNKNOWN,
            Self::NotApplicable => NOT_APPLICABLE,
        }
    }

    /// Two-state rendering used by non-streaming modes; failures collapse into No
    pub fn as_binary(&self) -> &'static str {
        match self {
            Self::Present => "Yes",
            Self::Absent | Self::Unknown => "No",
            Self::NotApplicable => NOT_APPLICABLE,
        }
    }
}

/// Locally gathered facts handed to the LLM as grounding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    pub creation_date: CreationDate,
    pub mx: MxPresence,
}

impl Evidence {
    pub fn unavailable() -> Self {
        Self {
            creation_date: CreationDate::Unavailable,
            mx: MxPresence::Unknown,
        }
    }

    pub fn not_applicable() -> Self {
        Self {
            creation_date: CreationDate::NotApplicable,
            mx: MxPresence::NotApplicable,
        }
    }
}

// ============================================
// Verdict
// ============================================

/// Three-tier risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    /// CSS-style class consumed by the front end
    pub fn class(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Text generated for downstream IT / communication use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    pub security_alert: String,
    pub social_post: String,
}

/// Structured risk judgment. `level` is always derived from `score`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskVerdict {
    pub score: u8,
    pub level: RiskLevel,
    pub summary: String,
    pub watch_for: Vec<String>,
    pub advice: String,
    pub generated: Option<GeneratedContent>,
}

// ============================================
// Result
// ============================================

/// One completed analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub target: AnalysisTarget,
    pub evidence: Evidence,
    pub verdict: RiskVerdict,
    pub raw_input: String,
    /// Produced by the allow-list fast path
    pub allow_listed: bool,
}

impl AnalysisResult {
    pub fn score(&self) -> u8 {
        self.verdict.score
    }

    /// Short one-line description for logs
    pub fn summary_line(&self) -> String {
        format!(
            "{} {} ({}/100) target={} kind={}",
            self.verdict.level.as_str(),
            if self.allow_listed { "[allow-list]" } else { "" },
            self.verdict.score,
            self.target.domain,
            self.target.kind.as_str()
        )
    }
}

// ============================================
// Wire representation
// ============================================

/// `{level, class, score}` block of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskBlock {
    pub level: String,
    pub class: String,
    pub score: u8,
}

impl From<&RiskVerdict> for RiskBlock {
    fn from(verdict: &RiskVerdict) -> Self {
        Self {
            level: verdict.level.as_str().to_string(),
            class: verdict.level.class().to_string(),
            score: verdict.score,
        }
    }
}

/// JSON shape returned to clients and archived by the audit sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub risk: RiskBlock,
    pub summary: String,
    pub watch_for: Vec<String>,
    pub advice: String,
    pub domain_age: String,
    pub mx_records: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<GeneratedContent>,
    pub raw_input: String,
    pub target: AnalysisTarget,
}

impl From<&AnalysisResult> for AnalysisReport {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            risk: RiskBlock::from(&result.verdict),
            summary: result.verdict.summary.clone(),
            watch_for: result.verdict.watch_for.clone(),
            advice: result.verdict.advice.clone(),
            domain_age: result.evidence.creation_date.as_str().to_string(),
            mx_records: result.evidence.mx.as_binary().to_string(),
            generated: result.verdict.generated.clone(),
            raw_input: result.raw_input.clone(),
            target: result.target.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_rejects_blank_prompt() {
        let err = AnalysisRequest::new("   \n", ModelTier::Fast).unwrap_err();
        assert_eq!(err.code_str(), "INPUT_MISSING_PROMPT");
        assert!(AnalysisRequest::from_wire(None, None).is_err());
    }

    #[test]
    fn test_request_trims_and_parses_tier() {
        let req = AnalysisRequest::from_wire(Some("  example.com "), Some("pro")).unwrap();
        assert_eq!(req.raw_input(), "example.com");
        assert_eq!(req.tier(), ModelTier::Thorough);

        let req = AnalysisRequest::from_wire(Some("example.com"), None).unwrap();
        assert_eq!(req.tier(), ModelTier::Fast);

        assert!(AnalysisRequest::from_wire(Some("example.com"), Some("ultra")).is_err());
    }

    #[test]
    fn test_mx_rendering() {
        assert_eq!(MxPresence::Unknown.as_ternary(), "unknown");
        assert_eq!(MxPresence::Unknown.as_binary(), "No");
        assert_eq!(MxPresence::Absent.as_binary(), "No");
        assert_eq!(MxPresence::Present.as_binary(), "Yes");
    }

    #[test]
    fn test_resolvable_domain() {
        let sentinel = AnalysisTarget::new(RAW_EMAIL_SENTINEL, TargetKind::RawEmailSource);
        assert!(!sentinel.has_resolvable_domain());
        let sender = AnalysisTarget::new("evil.example", TargetKind::RawEmailSource);
        assert!(sender.has_resolvable_domain());
    }

    #[test]
    fn test_report_shape() {
        let result = AnalysisResult {
            target: AnalysisTarget::new("scam.xyz", TargetKind::UrlOrDomain),
            evidence: Evidence::unavailable(),
            verdict: RiskVerdict {
                score: 55,
                level: RiskLevel::Medium,
                summary: "s".into(),
                watch_for: vec!["a".into()],
                advice: "x".into(),
                generated: None,
            },
            raw_input: "scam.xyz".into(),
            allow_listed: false,
        };
        let json = serde_json::to_value(AnalysisReport::from(&result)).unwrap();
        assert_eq!(json["risk"]["class"], "medium");
        assert_eq!(json["domainAge"], "unavailable");
        assert_eq!(json["mxRecords"], "No");
        assert_eq!(json["watchFor"][0], "a");
        assert_eq!(json["rawInput"], "scam.xyz");
        assert_eq!(json["target"]["kind"], "url_or_domain");
        assert!(json.get("generated").is_none());
    }
}
