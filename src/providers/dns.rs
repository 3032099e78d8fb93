//! Mail-exchange lookup via hickory-resolver.
//!
//! "No records" and "lookup failed" are reported differently: the first is
//! `Ok(false)`, the second an `EVIDENCE_LOOKUP_FAILED` error.

use futures_util::future::BoxFuture;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, warn};

use crate::models::{AppError, AppResult};

/// MX record source
pub trait MxLookup: Send + Sync {
    /// `Ok(true)` when at least one MX record exists, `Ok(false)` when the
    /// domain authoritatively has none
    fn has_mx<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, AppResult<bool>>;
}

/// System-configured DNS resolver
pub struct DnsMxLookup {
    resolver: TokioAsyncResolver,
}

impl DnsMxLookup {
    pub fn from_system_conf() -> Self {
        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                warn!("Failed to read system DNS config ({}), using default resolvers", e);
                TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self { resolver }
    }
}

impl MxLookup for DnsMxLookup {
    fn has_mx<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, AppResult<bool>> {
        Box::pin(async move {
            match self.resolver.mx_lookup(domain).await {
                Ok(records) => {
                    let count = records.iter().count();
                    for mx in records.iter().take(3) {
                        debug!("MX record for {}: {} (priority {})", domain, mx.exchange(), mx.preference());
                    }
                    Ok(count > 0)
                }
                Err(e) => match e.kind() {
                    ResolveErrorKind::NoRecordsFound { .. } => {
                        debug!("No MX records for {}", domain);
                        Ok(false)
                    }
                    _ => Err(AppError::lookup_failed(format!("MX lookup for {} failed: {}", domain, e))),
                },
            }
        })
    }
}
