//! Evidence Gatherer
//!
//! Decides whether a target is allow-listed and, if not, collects the domain's
//! registration date and mail-exchange presence. Lookups never fail the
//! analysis: errors and timeouts become the "unavailable"/"unknown" sentinels.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{AllowList, AnalysisTarget, AppError, AppResult, CreationDate, Evidence, MxPresence};
use crate::providers::dns::MxLookup;
use crate::providers::registry::RegistrationLookup;

/// Outcome of the allow-list check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatherOutcome {
    /// Trusted domain; no lookups were made
    AllowListed,
    Gathered(Evidence),
}

#[derive(Clone)]
pub struct EvidenceGatherer {
    allow_list: Arc<AllowList>,
    registry: Arc<dyn RegistrationLookup>,
    mx: Arc<dyn MxLookup>,
    timeout: Duration,
}

impl EvidenceGatherer {
    pub fn new(
        allow_list: AllowList,
        registry: Arc<dyn RegistrationLookup>,
        mx: Arc<dyn MxLookup>,
        timeout: Duration,
    ) -> Self {
        Self {
            allow_list: Arc::new(allow_list),
            registry,
            mx,
            timeout,
        }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Exact, case-sensitive match against the already-lowercased target domain
    pub fn is_allow_listed(&self, target: &AnalysisTarget) -> bool {
        self.allow_list.contains(&target.domain)
    }

    /// Allow-list check, then both lookups concurrently
    pub async fn gather(&self, target: &AnalysisTarget) -> GatherOutcome {
        if self.is_allow_listed(target) {
            return GatherOutcome::AllowListed;
        }
        let (creation_date, mx) = tokio::join!(self.creation_date(target), self.mx_presence(target));
        GatherOutcome::Gathered(Evidence { creation_date, mx })
    }

    /// Registration date, or `Unavailable` on any failure
    pub async fn creation_date(&self, target: &AnalysisTarget) -> CreationDate {
        if !target.has_resolvable_domain() {
            return CreationDate::Unavailable;
        }

        match self.bounded(self.registry.creation_dates(&target.domain)).await {
            Ok(dates) => match dates.first() {
                Some(date) => CreationDate::Known(format_date(date)),
                None => {
                    debug!("No creation date reported for {}", target.domain);
                    CreationDate::Unavailable
                }
            },
            Err(e) => {
                warn!(code = e.code_str(), "⚠️ Registration lookup failed for {}: {}", target.domain, e);
                CreationDate::Unavailable
            }
        }
    }

    /// MX presence, or `Unknown` on any failure
    pub async fn mx_presence(&self, target: &AnalysisTarget) -> MxPresence {
        if !target.has_resolvable_domain() {
            return MxPresence::Unknown;
        }

        match self.bounded(self.mx.has_mx(&target.domain)).await {
            Ok(true) => MxPresence::Present,
            Ok(false) => MxPresence::Absent,
            Err(e) => {
                warn!(code = e.code_str(), "⚠️ MX lookup failed for {}: {}", target.domain, e);
                MxPresence::Unknown
            }
        }
    }

    /// Expire cached lookup answers
    pub fn sweep_caches(&self) -> usize {
        self.registry.sweep()
    }

    async fn bounded<T>(&self, lookup: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| AppError::lookup_failed(format!("Lookup timed out after {}s", self.timeout.as_secs())))?
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetKind;
    use crate::utils::constants::RAW_EMAIL_SENTINEL;
    use chrono::TimeZone;
    use futures_util::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRegistry {
        dates: Vec<DateTime<Utc>>,
        fail: bool,
        calls: AtomicUsize,
        sweeps: AtomicUsize,
    }

    impl RegistrationLookup for FixedRegistry {
        fn creation_dates<'a>(&'a self, _domain: &'a str) -> BoxFuture<'a, AppResult<Vec<DateTime<Utc>>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if self.fail {
                    Err(AppError::lookup_failed("registry down"))
                } else {
                    Ok(self.dates.clone())
                }
            })
        }

        fn sweep(&self) -> usize {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            3
        }
    }

    struct FixedMx {
        answer: Option<bool>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl MxLookup for FixedMx {
        fn has_mx<'a>(&'a self, _domain: &'a str) -> BoxFuture<'a, AppResult<bool>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                self.answer.ok_or_else(|| AppError::lookup_failed("SERVFAIL"))
            })
        }
    }

    fn gatherer(dates: Vec<DateTime<Utc>>, fail: bool, mx: Option<bool>, delay: Duration) -> (EvidenceGatherer, Arc<FixedRegistry>, Arc<FixedMx>) {
        let registry = Arc::new(FixedRegistry { dates, fail, calls: AtomicUsize::new(0), sweeps: AtomicUsize::new(0) });
        let mx = Arc::new(FixedMx { answer: mx, delay, calls: AtomicUsize::new(0) });
        let g = EvidenceGatherer::new(AllowList::default(), registry.clone(), mx.clone(), Duration::from_millis(200));
        (g, registry, mx)
    }

    #[tokio::test]
    async fn test_allow_listed_skips_lookups() {
        let (g, registry, mx) = gatherer(vec![], false, Some(true), Duration::ZERO);
        let target = AnalysisTarget::new("phishfinder.bot", TargetKind::UrlOrDomain);
        assert_eq!(g.gather(&target).await, GatherOutcome::AllowListed);
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
        assert_eq!(mx.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_subdomain_is_not_allow_listed() {
        let (g, _, _) = gatherer(vec![], false, Some(true), Duration::ZERO);
        let target = AnalysisTarget::new("www2.phishfinder.bot", TargetKind::UrlOrDomain);
        assert!(!g.is_allow_listed(&target));
    }

    #[tokio::test]
    async fn test_first_date_is_used() {
        let dates = vec![
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(),
        ];
        let (g, _, _) = gatherer(dates, false, Some(false), Duration::ZERO);
        let target = AnalysisTarget::new("scam-domain.xyz", TargetKind::Email);
        match g.gather(&target).await {
            GatherOutcome::Gathered(evidence) => {
                assert_eq!(evidence.creation_date, CreationDate::Known("2024-05-01".into()));
                assert_eq!(evidence.mx, MxPresence::Absent);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failures_become_sentinels() {
        let (g, _, _) = gatherer(vec![], true, None, Duration::ZERO);
        let target = AnalysisTarget::new("scam-domain.xyz", TargetKind::Email);
        assert_eq!(g.gather(&target).await, GatherOutcome::Gathered(Evidence::unavailable()));
    }

    #[tokio::test]
    async fn test_registry_failure_keeps_mx_answer() {
        let (g, _, _) = gatherer(vec![], true, Some(true), Duration::ZERO);
        let target = AnalysisTarget::new("scam-domain.xyz", TargetKind::Email);
        match g.gather(&target).await {
            GatherOutcome::Gathered(evidence) => {
                assert_eq!(evidence.creation_date, CreationDate::Unavailable);
                assert_eq!(evidence.mx, MxPresence::Present);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mx_failure_keeps_creation_date() {
        let dates = vec![Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()];
        let (g, _, _) = gatherer(dates, false, None, Duration::ZERO);
        let target = AnalysisTarget::new("scam-domain.xyz", TargetKind::Email);
        match g.gather(&target).await {
            GatherOutcome::Gathered(evidence) => {
                assert_eq!(evidence.creation_date, CreationDate::Known("2024-05-01".into()));
                assert_eq!(evidence.mx, MxPresence::Unknown);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_lookup_times_out_to_unknown() {
        let (g, _, _) = gatherer(vec![], false, Some(true), Duration::from_secs(5));
        let target = AnalysisTarget::new("scam-domain.xyz", TargetKind::Email);
        assert_eq!(g.mx_presence(&target).await, MxPresence::Unknown);
    }

    #[test]
    fn test_sweep_reaches_registry_cache() {
        let (g, registry, _) = gatherer(vec![], false, Some(true), Duration::ZERO);
        assert_eq!(g.sweep_caches(), 3);
        assert_eq!(registry.sweeps.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sentinel_target_is_not_looked_up() {
        let (g, registry, mx) = gatherer(vec![], false, Some(true), Duration::ZERO);
        let target = AnalysisTarget::new(RAW_EMAIL_SENTINEL, TargetKind::RawEmailSource);
        assert_eq!(g.gather(&target).await, GatherOutcome::Gathered(Evidence::unavailable()));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
        assert_eq!(mx.calls.load(Ordering::SeqCst), 0);
    }
}
