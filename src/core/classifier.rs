//! Indicator Classifier
//!
//! Turns whatever the user pasted (email address, URL, bare domain or a full
//! raw email with headers) into an [`AnalysisTarget`]. Never fails: input that
//! matches nothing is used verbatim, lower-cased.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{AnalysisTarget, TargetKind};
use crate::utils::constants::RAW_EMAIL_SENTINEL;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@([^@\s]+\.[^@\s]+)$").unwrap();
    static ref FROM_HEADER_RE: Regex = Regex::new(r"From:.*?<[^@>\s]+@([^>\s]+)>").unwrap();
    // Unanchored: leading slashes are skipped to reach the first host-like run
    static ref URL_RE: Regex = Regex::new(r"(?i)(?:https?://)?(?:www\.)?([^/?#\s]+)").unwrap();
    static ref PORT_SUFFIX_RE: Regex = Regex::new(r":\d+$").unwrap();
}

const RECEIVED_MARKER: &str = "Received: from";
const SUBJECT_MARKER: &str = "Subject:";

/// Classify raw user input
pub fn classify(raw: &str) -> AnalysisTarget {
    let raw = raw.trim();

    if let Some(caps) = EMAIL_RE.captures(raw) {
        return AnalysisTarget::new(caps[1].to_lowercase(), TargetKind::Email);
    }

    if is_raw_email_source(raw) {
        let domain = FROM_HEADER_RE
            .captures(raw)
            .map(|caps| caps[1].to_lowercase())
            .unwrap_or_else(|| RAW_EMAIL_SENTINEL.to_string());
        return AnalysisTarget::new(domain, TargetKind::RawEmailSource);
    }

    let domain = URL_RE
        .captures(raw)
        .map(|caps| PORT_SUFFIX_RE.replace(&caps[1], "").to_lowercase())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| raw.to_lowercase());
    AnalysisTarget::new(domain, TargetKind::UrlOrDomain)
}

fn is_raw_email_source(raw: &str) -> bool {
    raw.contains(RECEIVED_MARKER) && raw.contains(SUBJECT_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_address() {
        let target = classify("test@scam-domain.xyz");
        assert_eq!(target.domain, "scam-domain.xyz");
        assert_eq!(target.kind, TargetKind::Email);

        let target = classify("  Alerts@PayPa1-Secure.COM ");
        assert_eq!(target.domain, "paypa1-secure.com");
    }

    #[test]
    fn test_url_strips_scheme_www_and_path() {
        let target = classify("https://phishfinder.bot/page");
        assert_eq!(target.domain, "phishfinder.bot");
        assert_eq!(target.kind, TargetKind::UrlOrDomain);

        assert_eq!(classify("http://www.Example.com/login?x=1").domain, "example.com");
        assert_eq!(classify("HTTPS://WWW.bank-verify.net").domain, "bank-verify.net");
        assert_eq!(classify("login.bank-verify.net/path").domain, "login.bank-verify.net");
        assert_eq!(classify("bank-verify.net:8443/a").domain, "bank-verify.net");
        assert_eq!(classify("bank-verify.net?next=/").domain, "bank-verify.net");
    }

    #[test]
    fn test_raw_email_with_sender() {
        let raw = "Received: from mail.evil.example (1.2.3.4)\n\
                   From: \"PayPal Support\" <service@Evil.Example>\n\
                   Subject: Your account is locked\n\n\
                   Click here";
        let target = classify(raw);
        assert_eq!(target.kind, TargetKind::RawEmailSource);
        assert_eq!(target.domain, "evil.example");
        assert!(target.has_resolvable_domain());
    }

    #[test]
    fn test_raw_email_without_sender_uses_sentinel() {
        let raw = "Received: from somewhere\nFrom: nobody\nSubject: hi";
        let target = classify(raw);
        assert_eq!(target.kind, TargetKind::RawEmailSource);
        assert_eq!(target.domain, RAW_EMAIL_SENTINEL);
        assert!(!target.has_resolvable_domain());
    }

    #[test]
    fn test_raw_email_needs_both_markers() {
        let target = classify("Subject: hello there");
        assert_eq!(target.kind, TargetKind::UrlOrDomain);
    }

    #[test]
    fn test_leading_slash_takes_first_segment() {
        let target = classify("/ONLY/PATH");
        assert_eq!(target.domain, "only");
        assert_eq!(target.kind, TargetKind::UrlOrDomain);

        assert_eq!(classify("//Evil.Example/login").domain, "evil.example");
    }

    #[test]
    fn test_unparseable_falls_back_to_input() {
        let target = classify("//?#");
        assert_eq!(target.domain, "//?#");
        assert_eq!(target.kind, TargetKind::UrlOrDomain);
    }
}
