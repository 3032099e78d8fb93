//! Domain Registration Lookup
//!
//! Finds when a domain was registered. RDAP is queried first; when it has no
//! answer the registry's WHOIS server is asked over port 43 and the text
//! response is scraped for a creation date.
//!
//! Answers are cached per domain for 24h.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use futures_util::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::models::{AppError, AppResult};
use crate::utils::cache::TtlCache;
use crate::utils::constants::{
    RDAP_BASE_URL, REGISTRY_CACHE_TTL_SECS, USER_AGENT, WHOIS_FALLBACK_SERVER, WHOIS_SERVERS,
};

/// Registration-date source
pub trait RegistrationLookup: Send + Sync {
    /// Every creation date the registry reports, oldest record first as given.
    /// An empty list means the registry answered without a date.
    fn creation_dates<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, AppResult<Vec<DateTime<Utc>>>>;

    /// Drop stale cached answers, returning how many went. Uncached sources have nothing to drop.
    fn sweep(&self) -> usize {
        0
    }
}

// ============================================
// RDAP
// ============================================

#[derive(Debug, Deserialize)]
struct RdapDomain {
    #[serde(default)]
    events: Vec<RdapEvent>,
}

#[derive(Debug, Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    event_action: String,
    #[serde(rename = "eventDate")]
    event_date: Option<String>,
}

/// Registration dates from an RDAP domain object
pub fn parse_rdap_events(body: &str) -> AppResult<Vec<DateTime<Utc>>> {
    let domain: RdapDomain = serde_json::from_str(body)
        .map_err(|e| AppError::lookup_failed(format!("Invalid RDAP response: {}", e)))?;

    Ok(domain
        .events
        .into_iter()
        .filter(|e| e.event_action.eq_ignore_ascii_case("registration"))
        .filter_map(|e| e.event_date)
        .filter_map(|d| parse_registry_date(&d))
        .collect())
}

// ============================================
// WHOIS
// ============================================

lazy_static! {
    static ref CREATION_PATTERNS: Vec<Regex> = [
        r"(?im)^\s*creation\s*date:\s*(.+)$",
        r"(?im)^\s*created(?:\s*on)?:\s*(.+)$",
        r"(?im)^\s*registered(?:\s*on)?:\s*(.+)$",
        r"(?im)^\s*registration\s*(?:date|time):\s*(.+)$",
        r"(?im)^\s*domain_date_created:\s*(.+)$",
        r"(?im)^\s*created_date:\s*(.+)$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect();
}

/// Creation dates found in a WHOIS text response
pub fn parse_whois_text(text: &str) -> Vec<DateTime<Utc>> {
    CREATION_PATTERNS
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| parse_registry_date(caps[1].trim()))
        .collect()
}

/// Accepts the date layouts registries actually emit
pub fn parse_registry_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for format in DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    let head = raw.split_whitespace().next().unwrap_or(raw);
    const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d-%b-%Y", "%Y.%m.%d", "%d.%m.%Y", "%Y/%m/%d"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(head, format) {
            return date.and_hms_opt(0, 0, 0).map(|ndt| Utc.from_utc_datetime(&ndt));
        }
    }

    None
}

/// WHOIS server responsible for the domain's TLD
pub fn whois_server_for(domain: &str) -> &'static str {
    let tld = domain.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    WHOIS_SERVERS
        .iter()
        .find(|(suffix, _)| *suffix == tld)
        .map(|(_, server)| *server)
        .unwrap_or(WHOIS_FALLBACK_SERVER)
}

// ============================================
// Client
// ============================================

/// RDAP + WHOIS registration lookup with a day-long cache
pub struct RegistryClient {
    http: reqwest::Client,
    rdap_base: String,
    timeout: Duration,
    cache: TtlCache<Vec<DateTime<Utc>>>,
}

impl RegistryClient {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            rdap_base: RDAP_BASE_URL.to_string(),
            timeout,
            cache: TtlCache::new(Duration::from_secs(REGISTRY_CACHE_TTL_SECS)),
        })
    }

    async fn query_rdap(&self, domain: &str) -> AppResult<Vec<DateTime<Utc>>> {
        let url = format!("{}/{}", self.rdap_base, domain);
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/rdap+json")
            .send()
            .await
            .map_err(|e| AppError::lookup_failed(format!("RDAP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::lookup_failed(format!("RDAP returned {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::lookup_failed(format!("RDAP body unreadable: {}", e)))?;
        parse_rdap_events(&body)
    }

    async fn query_whois(&self, domain: &str) -> AppResult<Vec<DateTime<Utc>>> {
        let server = whois_server_for(domain);
        debug!("Using WHOIS server: {} for domain: {}", server, domain);

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(format!("{}:43", server)))
            .await
            .map_err(|_| AppError::lookup_failed(format!("WHOIS connect to {} timed out", server)))?
            .map_err(|e| AppError::lookup_failed(format!("WHOIS connect to {} failed: {}", server, e)))?;

        stream
            .write_all(format!("{}\r\n", domain).as_bytes())
            .await
            .map_err(|e| AppError::lookup_failed(format!("WHOIS write failed: {}", e)))?;

        let mut response = Vec::new();
        tokio::time::timeout(self.timeout, stream.read_to_end(&mut response))
            .await
            .map_err(|_| AppError::lookup_failed("WHOIS read timed out"))?
            .map_err(|e| AppError::lookup_failed(format!("WHOIS read failed: {}", e)))?;

        if response.is_empty() {
            return Err(AppError::lookup_failed("Empty WHOIS response"));
        }
        Ok(parse_whois_text(&String::from_utf8_lossy(&response)))
    }
}

impl RegistrationLookup for RegistryClient {
    fn creation_dates<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, AppResult<Vec<DateTime<Utc>>>> {
        Box::pin(async move {
            if let Some(dates) = self.cache.get(domain) {
                return Ok(dates);
            }

            let dates = match self.query_rdap(domain).await {
                Ok(dates) if !dates.is_empty() => dates,
                Ok(_) => {
                    debug!("RDAP had no registration event for {}, trying WHOIS", domain);
                    self.query_whois(domain).await?
                }
                Err(e) => {
                    debug!("RDAP lookup for {} failed ({}), trying WHOIS", domain, e);
                    self.query_whois(domain).await?
                }
            };

            if let Some(first) = dates.first() {
                info!("📅 {} registered {}", domain, first.format("%Y-%m-%d"));
                self.cache.set(domain, dates.clone());
            }
            Ok(dates)
        })
    }

    fn sweep(&self) -> usize {
        self.cache.cleanup_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rdap_registration_event() {
        let body = r#"{
            "ldhName": "example.com",
            "events": [
                {"eventAction": "expiration", "eventDate": "2030-08-13T04:00:00Z"},
                {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
                {"eventAction": "last changed", "eventDate": "2024-08-14T07:01:34Z"}
            ]
        }"#;
        let dates = parse_rdap_events(body).unwrap();
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].format("%Y-%m-%d").to_string(), "1995-08-14");
    }

    #[test]
    fn test_parse_rdap_without_events() {
        assert!(parse_rdap_events(r#"{"ldhName": "x.com"}"#).unwrap().is_empty());
        assert!(parse_rdap_events("not json").is_err());
    }

    #[test]
    fn test_parse_whois_text() {
        let text = "Domain Name: SCAM-DOMAIN.XYZ\r\n\
                    Registry Domain ID: D1234\r\n\
                    Updated Date: 2024-06-01T10:00:00Z\r\n\
                    Creation Date: 2024-05-01T09:30:00Z\r\n";
        let dates = parse_whois_text(text);
        assert_eq!(dates[0].format("%Y-%m-%d").to_string(), "2024-05-01");

        let text = "domain: example.it\ncreated: 2001.03.12\n";
        assert_eq!(parse_whois_text(text)[0].format("%Y-%m-%d").to_string(), "2001-03-12");

        assert!(parse_whois_text("No match for domain").is_empty());
    }

    #[test]
    fn test_parse_registry_date_formats() {
        for raw in ["2024-05-01", "2024-05-01 12:00:00", "01-May-2024", "2024-05-01T00:00:00+02:00"] {
            let parsed = parse_registry_date(raw).unwrap_or_else(|| panic!("{} should parse", raw));
            assert!(parsed.format("%Y-%m").to_string().starts_with("2024-0"));
        }
        assert!(parse_registry_date("before christ").is_none());
    }

    #[test]
    fn test_whois_server_for_tld() {
        assert_eq!(whois_server_for("example.com"), "whois.verisign-grs.com");
        assert_eq!(whois_server_for("scam.unknowntld"), WHOIS_FALLBACK_SERVER);
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_answers() {
        let client = RegistryClient::new(Duration::from_secs(1)).unwrap();
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        client.cache.set("scam-domain.xyz", vec![date]);

        assert_eq!(client.sweep(), 0);
        // Served from cache, no network
        assert_eq!(client.creation_dates("scam-domain.xyz").await.unwrap(), vec![date]);
    }
}
