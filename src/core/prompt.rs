//! Risk Prompt Builder
//!
//! Assembles the instruction sent to the LLM together with the JSON schema the
//! answer must satisfy. Evidence is embedded verbatim, sentinels included, so
//! the model can tell "no MX records" apart from "lookup failed".

use serde_json::{json, Value};

use crate::models::{AnalysisTarget, Evidence};
use crate::utils::constants::{
    APP_NAME, FIELD_ADVICE, FIELD_RISK_SCORE, FIELD_SECURITY_ALERT, FIELD_SOCIAL_POST,
    FIELD_SUMMARY, FIELD_WATCH_FOR,
};

/// Which output fields the schema demands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptVariant {
    /// Score, summary, watch-for list, advice
    Basic,
    /// Basic plus a security alert and a social post
    #[default]
    Full,
}

/// How mail-exchange evidence is rendered into the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MxRendering {
    /// Yes / No; lookup failures collapse into No
    Binary,
    /// Yes / No / unknown
    Ternary,
}

impl MxRendering {
    pub fn render(&self, evidence: &Evidence) -> &'static str {
        match self {
            MxRendering::Binary => evidence.mx.as_binary(),
            MxRendering::Ternary => evidence.mx.as_ternary(),
        }
    }
}

/// A ready-to-send LLM request
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub text: String,
    pub schema: Value,
    pub variant: PromptVariant,
}

/// Builds [`PromptRequest`]s for one prompt variant
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskPromptBuilder {
    variant: PromptVariant,
}

impl RiskPromptBuilder {
    pub fn new(variant: PromptVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> PromptVariant {
        self.variant
    }

    pub fn build(
        &self,
        raw_input: &str,
        target: &AnalysisTarget,
        evidence: &Evidence,
        mx_rendering: MxRendering,
    ) -> PromptRequest {
        let requested_fields = match self.variant {
            PromptVariant::Basic => format!(
                "'{}' (integer 0-100), '{}', '{}' (list of short warning signs) and '{}'",
                FIELD_RISK_SCORE, FIELD_SUMMARY, FIELD_WATCH_FOR, FIELD_ADVICE
            ),
            PromptVariant::Full => format!(
                "'{}' (integer 0-100), '{}', '{}' (list of short warning signs), '{}', \
                 '{}' (a short alert an IT team can forward to staff) and \
                 '{}' (a short public awareness post)",
                FIELD_RISK_SCORE,
                FIELD_SUMMARY,
                FIELD_WATCH_FOR,
                FIELD_ADVICE,
                FIELD_SECURITY_ALERT,
                FIELD_SOCIAL_POST
            ),
        };

        let text = format!(
            "You are {app}, a phishing analyst. Analyze the potential phishing risk of the input: '{raw}'.\n\
             Input type: {kind}. {hint}\n\
             The extracted domain for analysis is '{domain}'.\n\
             Key evidence: Domain Creation Date: {created}. MX Records Found: {mx}.\n\
             Evidence values 'unavailable' or 'unknown' mean the lookup was inconclusive, not that the domain is safe.\n\
             Provide {fields}.\n\
             Format the entire response as a single JSON object.",
            app = APP_NAME,
            raw = raw_input,
            kind = target.kind.as_str(),
            hint = target.kind.context_hint(),
            domain = target.domain,
            created = evidence.creation_date.as_str(),
            mx = mx_rendering.render(evidence),
            fields = requested_fields,
        );

        PromptRequest {
            text,
            schema: response_schema(self.variant),
            variant: self.variant,
        }
    }
}

/// JSON schema of the expected answer; every declared field is required
pub fn response_schema(variant: PromptVariant) -> Value {
    let mut properties = json!({
        FIELD_RISK_SCORE: { "type": "integer" },
        FIELD_SUMMARY: { "type": "string" },
        FIELD_WATCH_FOR: { "type": "array", "items": { "type": "string" } },
        FIELD_ADVICE: { "type": "string" },
    });
    let mut required = vec![FIELD_RISK_SCORE, FIELD_SUMMARY, FIELD_WATCH_FOR, FIELD_ADVICE];

    if variant == PromptVariant::Full {
        if let Some(map) = properties.as_object_mut() {
            map.insert(FIELD_SECURITY_ALERT.to_string(), json!({ "type": "string" }));
            map.insert(FIELD_SOCIAL_POST.to_string(), json!({ "type": "string" }));
        }
        required.extend([FIELD_SECURITY_ALERT, FIELD_SOCIAL_POST]);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
