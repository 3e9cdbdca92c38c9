//! Daemon wiring and the decision loop
//!
//! A single loop consumes scans from the reader link in arrival order. For
//! each scan it runs the authorization cascade, dispatches the hardware
//! signal first, then hands the decision to the audit recorder and the
//! notifier as detached background work.

use std::sync::Arc;

use access_core::{authorize, AccessDecision, CredentialCache, CredentialStore, EngineConfig};
use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::audit::AuditRecorder;
use crate::config::Config;
use crate::notify::Notifier;
use crate::reader::ReaderLink;
use crate::remote::HttpCredentialStore;
use crate::resync;
use crate::telemetry::LogMetrics;

/// Bound on queued scans; the reader never gets further ahead than this
/// while a remote fallback is in flight.
const SCAN_QUEUE_DEPTH: usize = 32;

/// Sink for the physical accept/deny pulse.
#[async_trait::async_trait]
pub trait GateSignal: Send + Sync {
    async fn signal(&self, admit: bool);
}

#[async_trait::async_trait]
impl GateSignal for ReaderLink {
    async fn signal(&self, admit: bool) {
        ReaderLink::signal(self, admit).await;
    }
}

pub async fn run(config: Config) -> Result<()> {
    let cache =
        CredentialCache::open(&config.cache_path).context("failed to open credential cache")?;
    let store: Arc<dyn CredentialStore> =
        Arc::new(HttpCredentialStore::new(&config.store)?);
    let audit = AuditRecorder::new(store.clone());
    let notifier = Notifier::new(&config.webhook);
    let reader = Arc::new(ReaderLink::new(&config.reader));
    let engine = EngineConfig {
        leniency: config.leniency,
    };

    let (scan_tx, mut scan_rx) = mpsc::channel::<String>(SCAN_QUEUE_DEPTH);
    tokio::spawn(reader.clone().run(scan_tx));
    tokio::spawn(resync::resync_task(
        cache.clone(),
        store.clone(),
        config.resync_interval,
    ));

    info!("doorward ready");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
            scan = scan_rx.recv() => {
                let Some(credential) = scan else {
                    anyhow::bail!("scan channel closed");
                };
                handle_scan(
                    &credential,
                    &engine,
                    &cache,
                    store.as_ref(),
                    reader.as_ref(),
                    &audit,
                    &notifier,
                )
                .await;
            }
        }
    }
}

/// Decide one scan and act on it: the physical pulse is awaited before any
/// audit or notification I/O, so the door reacts with cache-lookup latency.
async fn handle_scan(
    credential: &str,
    engine: &EngineConfig,
    cache: &CredentialCache,
    store: &dyn CredentialStore,
    gate: &dyn GateSignal,
    audit: &AuditRecorder,
    notifier: &Notifier,
) -> AccessDecision {
    let decision = authorize(credential, engine, cache, store, &LogMetrics).await;

    gate.signal(decision.is_admitted()).await;

    dispatch(audit, notifier, credential, &decision);
    decision
}

/// Fan a decision out to the audit trail and the notifier. Both are
/// spawned background work; nothing here can delay the next scan.
fn dispatch(
    audit: &AuditRecorder,
    notifier: &Notifier,
    credential: &str,
    decision: &AccessDecision,
) {
    audit.record(credential, decision);

    match decision {
        AccessDecision::Admit { holder, .. } => notifier.admitted(holder),
        AccessDecision::Deny {
            reason, escalate, ..
        } => notifier.denied(reason, *escalate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebhookConfig;
    use access_core::{now_millis, Checkin, CredentialRecord, Rejection, StoreError, Validity};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Shared ordered trace of gate pulses and store writes.
    #[derive(Default)]
    struct EventLog(Mutex<Vec<&'static str>>);

    struct TracingGate {
        log: Arc<EventLog>,
        admitted: Mutex<Vec<bool>>,
    }

    #[async_trait::async_trait]
    impl GateSignal for TracingGate {
        async fn signal(&self, admit: bool) {
            self.log.0.lock().unwrap().push("signal");
            self.admitted.lock().unwrap().push(admit);
        }
    }

    struct TracingStore {
        log: Arc<EventLog>,
        records: Vec<CredentialRecord>,
    }

    #[async_trait::async_trait]
    impl CredentialStore for TracingStore {
        async fn fetch(&self, id: &str) -> Result<Option<CredentialRecord>, StoreError> {
            Ok(self.records.iter().find(|r| r.id == id).cloned())
        }

        async fn insert_unregistered(&self, _id: &str) -> Result<(), StoreError> {
            self.log.0.lock().unwrap().push("insert");
            Ok(())
        }

        async fn record_checkin(&self, _checkin: &Checkin) -> Result<(), StoreError> {
            self.log.0.lock().unwrap().push("checkin");
            Ok(())
        }

        async fn record_rejection(&self, _rejection: &Rejection) -> Result<(), StoreError> {
            self.log.0.lock().unwrap().push("rejection");
            Ok(())
        }

        async fn list_all(&self) -> Result<Vec<CredentialRecord>, StoreError> {
            Ok(self.records.clone())
        }
    }

    fn active_record(id: &str, holder: &str) -> CredentialRecord {
        CredentialRecord {
            id: id.to_string(),
            holder: Some(holder.to_string()),
            validity: Validity::ActiveMember,
            expiry: now_millis() + 86_400_000,
        }
    }

    async fn settle() {
        // Let the spawned audit tasks run to completion
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn fixtures(
        records: Vec<CredentialRecord>,
    ) -> (Arc<EventLog>, TracingGate, TracingStore, AuditRecorder, Notifier) {
        let log = Arc::new(EventLog::default());
        let gate = TracingGate {
            log: log.clone(),
            admitted: Mutex::new(Vec::new()),
        };
        let store = TracingStore {
            log: log.clone(),
            records,
        };
        let audit = AuditRecorder::new(Arc::new(TracingStore {
            log: log.clone(),
            records: Vec::new(),
        }));
        let notifier = Notifier::new(&WebhookConfig::default());
        (log, gate, store, audit, notifier)
    }

    #[tokio::test]
    async fn test_signal_precedes_checkin_write() {
        let dir = tempdir().unwrap();
        let cache = CredentialCache::open(dir.path().join("cache.redb")).unwrap();
        cache.set(&active_record("04AB11", "Sam Vimes")).unwrap();

        let (log, gate, store, audit, notifier) = fixtures(Vec::new());
        let engine = EngineConfig::default();

        let decision =
            handle_scan("04AB11", &engine, &cache, &store, &gate, &audit, &notifier).await;
        settle().await;

        assert!(decision.is_admitted());
        assert_eq!(gate.admitted.lock().unwrap().as_slice(), [true]);
        // The pulse goes out before the audit trail is touched
        assert_eq!(log.0.lock().unwrap().as_slice(), ["signal", "checkin"]);
    }

    #[tokio::test]
    async fn test_signal_precedes_rejection_writes() {
        let dir = tempdir().unwrap();
        let cache = CredentialCache::open(dir.path().join("cache.redb")).unwrap();

        let (log, gate, store, audit, notifier) = fixtures(Vec::new());
        let engine = EngineConfig::default();

        // Unknown everywhere: unregistered denial with two store writes
        let decision =
            handle_scan("DEAD99", &engine, &cache, &store, &gate, &audit, &notifier).await;
        settle().await;

        assert!(!decision.is_admitted());
        assert_eq!(gate.admitted.lock().unwrap().as_slice(), [false]);
        assert_eq!(
            log.0.lock().unwrap().as_slice(),
            ["signal", "insert", "rejection"]
        );
    }

    #[tokio::test]
    async fn test_signal_never_waits_on_audit() {
        struct StalledStore;

        #[async_trait::async_trait]
        impl CredentialStore for StalledStore {
            async fn fetch(&self, _id: &str) -> Result<Option<CredentialRecord>, StoreError> {
                Ok(None)
            }

            async fn insert_unregistered(&self, _id: &str) -> Result<(), StoreError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }

            async fn record_checkin(&self, _checkin: &Checkin) -> Result<(), StoreError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }

            async fn record_rejection(&self, _rejection: &Rejection) -> Result<(), StoreError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }

            async fn list_all(&self) -> Result<Vec<CredentialRecord>, StoreError> {
                Ok(Vec::new())
            }
        }

        let dir = tempdir().unwrap();
        let cache = CredentialCache::open(dir.path().join("cache.redb")).unwrap();
        cache.set(&active_record("04AB11", "Sam Vimes")).unwrap();

        let log = Arc::new(EventLog::default());
        let gate = TracingGate {
            log: log.clone(),
            admitted: Mutex::new(Vec::new()),
        };
        let audit = AuditRecorder::new(Arc::new(StalledStore));
        let notifier = Notifier::new(&WebhookConfig::default());
        let engine = EngineConfig::default();

        // Wedged audit writes must not hold up the scan handling itself
        let decision = tokio::time::timeout(
            Duration::from_secs(1),
            handle_scan(
                "04AB11",
                &engine,
                &cache,
                &StalledStore,
                &gate,
                &audit,
                &notifier,
            ),
        )
        .await
        .expect("scan handling blocked on audit I/O");

        assert!(decision.is_admitted());
        assert_eq!(log.0.lock().unwrap().as_slice(), ["signal"]);
    }
}
