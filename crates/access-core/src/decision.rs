//! Core authorization decision logic
//!
//! Implements the cache-first lookup cascade for scanned credentials:
//! local cache, then remote store on a miss, with fail-closed denial when
//! either source errors out.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::cache::{CacheError, CredentialCache};
use crate::store::{CredentialRecord, CredentialStore, StoreError};

/// Current time as unix epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as i64
}

/// Configuration for authorization decisions.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Grace window added to a record's expiry before comparison with now,
    /// so a renewal delay does not lock out an active holder.
    pub leniency: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            leniency: Duration::from_secs(72 * 3600),
        }
    }
}

/// Where the evaluated record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// Local cache hit.
    Cache,
    /// Fetched from the remote store after a cache miss.
    Store,
}

/// Outcome of one authorization.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    /// Admit the holder.
    Admit {
        /// Recorded holder name.
        holder: String,
        /// Where the record came from.
        source: DecisionSource,
    },
    /// Deny the credential.
    Deny {
        /// Human-readable reason for the denial.
        reason: String,
        /// Holder name, when a recorded holder was rejected.
        holder: Option<String>,
        /// Recorded state; "unregistered" for unknown credentials, `None`
        /// when the pipeline failed before any record was evaluated.
        validity: Option<String>,
        /// Route the denial to the admin escalation channel as well.
        escalate: bool,
        /// Where the record came from, if one was evaluated.
        source: Option<DecisionSource>,
    },
}

impl AccessDecision {
    /// Denial for a credential absent from both cache and store.
    pub fn deny_unregistered() -> Self {
        AccessDecision::Deny {
            reason: "unregistered credential".to_string(),
            holder: None,
            validity: Some("unregistered".to_string()),
            escalate: false,
            source: None,
        }
    }

    /// Fail-closed denial when cache or store access failed.
    pub fn deny_unavailable() -> Self {
        AccessDecision::Deny {
            reason: "access check unavailable".to_string(),
            holder: None,
            validity: None,
            escalate: false,
            source: None,
        }
    }

    /// Whether the decision admits.
    pub fn is_admitted(&self) -> bool {
        matches!(self, AccessDecision::Admit { .. })
    }

    /// Whether this is the unknown-credential denial, which triggers the
    /// minimal store insert for later manual registration.
    pub fn is_unregistered(&self) -> bool {
        matches!(
            self,
            AccessDecision::Deny {
                source: None,
                validity: Some(v),
                ..
            } if v.as_str() == "unregistered"
        )
    }

    /// Metrics outcome label for this decision.
    pub fn outcome(&self) -> &'static str {
        match self {
            AccessDecision::Admit {
                source: DecisionSource::Cache,
                ..
            } => "admit_cache",
            AccessDecision::Admit {
                source: DecisionSource::Store,
                ..
            } => "admit_store",
            AccessDecision::Deny {
                source: Some(DecisionSource::Cache),
                ..
            } => "deny_cache",
            AccessDecision::Deny {
                source: Some(DecisionSource::Store),
                ..
            } => "deny_store",
            AccessDecision::Deny {
                validity: Some(_), ..
            } => "deny_unregistered",
            AccessDecision::Deny { .. } => "deny_error",
        }
    }
}

/// Metrics callback trait for recording authorization decisions.
pub trait DecisionMetrics: Send + Sync {
    /// Record a decision outcome label.
    fn record_decision(&self, outcome: &str);
    /// Record decision latency in seconds.
    fn record_latency(&self, seconds: f64);
}

/// No-op metrics implementation for testing.
pub struct NoopMetrics;

impl DecisionMetrics for NoopMetrics {
    fn record_decision(&self, _outcome: &str) {}
    fn record_latency(&self, _seconds: f64) {}
}

/// Evaluate a record's standing at a point in time. Pure function; the one
/// and only place an admit can come from.
pub fn evaluate_standing(
    record: &CredentialRecord,
    now_ms: i64,
    leniency: Duration,
    source: DecisionSource,
) -> AccessDecision {
    if !record.validity.admits() {
        // Known holders in a non-admitting state get escalated so someone
        // reaches out to them
        return AccessDecision::Deny {
            reason: format!("invalid credential state: {}", record.validity),
            holder: record.holder.clone(),
            validity: Some(record.validity.as_str().to_string()),
            escalate: record.holder.is_some(),
            source: Some(source),
        };
    }

    // An admitting record without a holder violates the store invariant;
    // treat it like any other invalid state rather than admit a nameless scan
    let Some(holder) = record.holder.clone() else {
        return AccessDecision::Deny {
            reason: "invalid credential state: missing holder".to_string(),
            holder: None,
            validity: Some(record.validity.as_str().to_string()),
            escalate: false,
            source: Some(source),
        };
    };

    let leniency_ms = leniency.as_millis() as i64;
    if now_ms >= record.expiry.saturating_add(leniency_ms) {
        return AccessDecision::Deny {
            reason: "membership lapsed".to_string(),
            holder: Some(holder),
            validity: Some(record.validity.as_str().to_string()),
            escalate: true,
            source: Some(source),
        };
    }

    AccessDecision::Admit { holder, source }
}

#[derive(Debug, thiserror::Error)]
enum EvalError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Authorize a scanned credential.
///
/// Cascade:
/// 1. Local cache hit: evaluate the cached record outright. The store is
///    not consulted even if the entry could be stale; staleness is bounded
///    only by the resync interval. This keeps the hit path free of network
///    waits.
/// 2. Cache miss: fetch from the store. A fetched record is backfilled
///    into the cache before evaluation, regardless of the outcome, so the
///    next scan is a hit.
/// 3. Unknown everywhere: deny as unregistered.
/// 4. Any cache or store failure: deny (fail-closed), never admit, never
///    panic.
///
/// Exactly one standing evaluation happens per call.
pub async fn authorize(
    credential: &str,
    config: &EngineConfig,
    cache: &CredentialCache,
    store: &dyn CredentialStore,
    metrics: &dyn DecisionMetrics,
) -> AccessDecision {
    let start = Instant::now();

    let decision = match evaluate(credential, config, cache, store).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!(credential, error = %e, "authorization pipeline failed, denying");
            AccessDecision::deny_unavailable()
        }
    };

    metrics.record_decision(decision.outcome());
    metrics.record_latency(start.elapsed().as_secs_f64());
    decision
}

async fn evaluate(
    credential: &str,
    config: &EngineConfig,
    cache: &CredentialCache,
    store: &dyn CredentialStore,
) -> Result<AccessDecision, EvalError> {
    if let Some(record) = cache.get(credential)? {
        debug!(credential, "cache hit");
        return Ok(evaluate_standing(
            &record,
            now_millis(),
            config.leniency,
            DecisionSource::Cache,
        ));
    }

    match store.fetch(credential).await? {
        Some(record) => {
            // Backfill first so the next scan hits the cache
            cache.set(&record)?;
            debug!(credential, "cache miss, record fetched from store");
            Ok(evaluate_standing(
                &record,
                now_millis(),
                config.leniency,
                DecisionSource::Store,
            ))
        }
        None => {
            debug!(credential, "credential unknown to cache and store");
            Ok(AccessDecision::deny_unregistered())
        }
    }
}
