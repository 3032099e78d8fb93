//! Risk Normalizer
//! Maps raw upstream scores onto the 0-100 scale and the three-tier level.
//!
//! - 0-49:   Low
//! - 50-79:  Medium
//! - 80-100: High
//!
//! The mapping is identical in every delivery mode.

use crate::models::{RiskLevel, RiskVerdict};
use crate::utils::constants::{HIGH_RISK_THRESHOLD, MEDIUM_RISK_THRESHOLD};

impl RiskLevel {
    /// Pure function of the score
    pub fn from_score(score: u8) -> Self {
        if score >= HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if score >= MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Clamp whatever the upstream produced into 0..=100
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

/// Locally generated advice, used only when the upstream omits it
pub fn fallback_advice(score: u8) -> &'static str {
    if score >= HIGH_RISK_THRESHOLD {
        "Do not interact with this message or site. Do not click links, open attachments, \
         or reply. Block the sender and report it to your IT or security team."
    } else if score >= MEDIUM_RISK_THRESHOLD {
        "Proceed with caution. Verify the request through a separate, trusted channel \
         (for example the official website or a known phone number) before acting on it."
    } else {
        "No strong phishing indicators were found, but stay vigilant: never share passwords \
         or payment details in response to unsolicited messages."
    }
}

/// Builder for verdicts; guarantees `level` always follows `score`
pub struct VerdictBuilder {
    score: u8,
    summary: Option<String>,
    watch_for: Vec<String>,
    advice: Option<String>,
    security_alert: Option<String>,
    social_post: Option<String>,
}

impl VerdictBuilder {
    pub fn new(score: u8) -> Self {
        Self {
            score: score.min(100),
            summary: None,
            watch_for: Vec::new(),
            advice: None,
            security_alert: None,
            social_post: None,
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn watch_for(mut self, items: Vec<String>) -> Self {
        self.watch_for = items;
        self
    }

    pub fn advice(mut self, advice: impl Into<String>) -> Self {
        self.advice = Some(advice.into());
        self
    }

    pub fn generated(mut self, security_alert: Option<String>, social_post: Option<String>) -> Self {
        self.security_alert = security_alert;
        self.social_post = social_post;
        self
    }

    pub fn build(self) -> RiskVerdict {
        let level = RiskLevel::from_score(self.score);
        let advice = self
            .advice
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| fallback_advice(self.score).to_string());
        let generated = match (self.security_alert, self.social_post) {
            (None, None) => None,
            (alert, post) => Some(crate::models::GeneratedContent {
                security_alert: alert.unwrap_or_default(),
                social_post: post.unwrap_or_default(),
            }),
        };

        RiskVerdict {
            score: self.score,
            level,
            summary: self
                .summary
                .unwrap_or_else(|| crate::utils::constants::DEFAULT_SUMMARY.to_string()),
            watch_for: self.watch_for,
            advice,
            generated,
        }
    }
}
