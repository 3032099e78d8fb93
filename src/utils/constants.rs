//! Constants Module - Single Source of Truth
//!
//! Every literal the pipeline depends on (allow-list, endpoints, timeouts,
//! sentinels, schema field names) is defined here.

use std::time::Duration;

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "PhishFinder";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for outbound HTTP requests
pub const USER_AGENT: &str = concat!("PhishFinder/", env!("CARGO_PKG_VERSION"));

// ============================================
// ALLOW-LIST
// ============================================

/// Domains trusted unconditionally; a hit bypasses the LLM entirely
pub const DEFAULT_ALLOW_LIST: [&str; 15] = [
    "cyberattribution.ai",
    "aarp.org",
    "ncoa.org",
    "consumerfed.org",
    "cyberseniors.org",
    "pta.org",
    "consumer.ftc.gov",
    "bbb.org",
    "idtheftcenter.org",
    "lifelock.com",
    "phishfinder.bot",
    "attributionengine.bot",
    "attributionagent.com",
    "attributionagent.ai",
    "deerpfakedefender.ai",
];

// ============================================
// CLASSIFIER SENTINELS
// ============================================

/// Target used when raw email source carries no parseable sender
pub const RAW_EMAIL_SENTINEL: &str = "raw_email_content";

// ============================================
// EVIDENCE
// ============================================

/// Creation date sentinel when the registry lookup fails or is skipped
pub const CREATION_DATE_UNAVAILABLE: &str = "unavailable";

/// MX sentinel for an inconclusive lookup (streaming only)
pub const MX_UNKNOWN: &str = "unknown";

/// Placeholder shown for evidence on allow-listed targets
pub const NOT_APPLICABLE: &str = "N/A";

/// Per-lookup timeout (seconds)
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 5;

/// Registration lookups are cached for a day
pub const REGISTRY_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// RDAP bootstrap redirector
pub const RDAP_BASE_URL: &str = "https://rdap.org/domain";

/// WHOIS servers by TLD, used when RDAP yields nothing
pub const WHOIS_SERVERS: [(&str, &str); 12] = [
    ("com", "whois.verisign-grs.com"),
    ("net", "whois.verisign-grs.com"),
    ("org", "whois.pir.org"),
    ("info", "whois.afilias.net"),
    ("biz", "whois.neulevel.biz"),
    ("us", "whois.nic.us"),
    ("uk", "whois.nic.uk"),
    ("de", "whois.denic.de"),
    ("io", "whois.nic.io"),
    ("xyz", "whois.nic.xyz"),
    ("ai", "whois.nic.ai"),
    ("bot", "whois.nic.bot"),
];

/// Fallback WHOIS server for TLDs not listed above
pub const WHOIS_FALLBACK_SERVER: &str = "whois.iana.org";

// ============================================
// LLM CONSTANTS
// ============================================

/// Gemini REST base URL
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Model used for the fast tier
pub const DEFAULT_FAST_MODEL: &str = "gemini-2.5-flash";

/// Model used for the thorough tier
pub const DEFAULT_THOROUGH_MODEL: &str = "gemini-2.5-pro";

/// Fast tier timeout (seconds)
pub const FAST_TIER_TIMEOUT_SECS: u64 = 60;

/// Thorough tier timeout (seconds)
pub const THOROUGH_TIER_TIMEOUT_SECS: u64 = 90;

/// Default retry budget: one initial call plus one retry
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Delay between attempts
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// "Service temporarily unavailable"
pub const HTTP_SERVICE_UNAVAILABLE: u16 = 503;

// Schema field names the upstream must produce
pub const FIELD_RISK_SCORE: &str = "risk_score";
pub const FIELD_SUMMARY: &str = "summary";
pub const FIELD_WATCH_FOR: &str = "watchFor";
pub const FIELD_ADVICE: &str = "advice";
pub const FIELD_SECURITY_ALERT: &str = "security_alert";
pub const FIELD_SOCIAL_POST: &str = "social_post";

/// Used when the upstream omits a summary
pub const DEFAULT_SUMMARY: &str = "No summary provided.";

// ============================================
// RISK THRESHOLDS
// ============================================

/// Scores at or above this are High
pub const HIGH_RISK_THRESHOLD: u8 = 80;

/// Scores at or above this (and below High) are Medium
pub const MEDIUM_RISK_THRESHOLD: u8 = 50;

// ============================================
// API CONSTANTS
// ============================================

/// Default requests per client per window
pub const DEFAULT_RATE_LIMIT: u32 = 30;

/// Sliding rate-limit window
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Max concurrently executing background jobs
pub const DEFAULT_MAX_RUNNING_JOBS: usize = 16;

/// Max jobs tracked before submissions are refused
pub const DEFAULT_MAX_TRACKED_JOBS: usize = 10_000;

/// Finished jobs are forgotten after this long
pub const JOB_RESULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Max in-flight HTTP requests
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 256;

/// Media type for streamed analyses
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Message returned for failed analyses; detail stays in logs
pub const GENERIC_ANALYSIS_ERROR: &str = "The analysis could not be completed. Please try again later.";

/// Default server port
pub const DEFAULT_PORT: u16 = 10000;
