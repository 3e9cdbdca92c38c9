//! Best-effort audit trail writer
//!
//! Projects each decision into exactly one checkin or rejection and writes
//! it to the remote store from a background task. Failures are logged and
//! never reach the decision path; the recorder is only invoked after the
//! hardware signal has gone out.

use std::sync::Arc;

use access_core::{now_millis, AccessDecision, Checkin, CredentialStore, Rejection};
use tracing::warn;

/// Asynchronous audit recorder over the remote store.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn CredentialStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Record the audit entry for one decision. Spawns and returns
    /// immediately; write errors are captured in the log only.
    pub fn record(&self, credential: &str, decision: &AccessDecision) {
        match decision {
            AccessDecision::Admit { holder, .. } => {
                let store = self.store.clone();
                let checkin = Checkin {
                    name: holder.clone(),
                    time: now_millis(),
                };
                tokio::spawn(async move {
                    if let Err(e) = store.record_checkin(&checkin).await {
                        warn!(name = %checkin.name, error = %e, "checkin not saved");
                    }
                });
            }
            AccessDecision::Deny {
                holder, validity, ..
            } => {
                let store = self.store.clone();
                let register = decision.is_unregistered();
                let rejection = Rejection {
                    id: credential.to_string(),
                    holder: holder.clone(),
                    // Missing state means the check itself failed, not that
                    // the credential was unknown
                    validity: validity
                        .clone()
                        .unwrap_or_else(|| "unavailable".to_string()),
                    time: now_millis(),
                };
                tokio::spawn(async move {
                    if register {
                        // Unknown card: surface it in the store so it can be
                        // registered manually later
                        if let Err(e) = store.insert_unregistered(&rejection.id).await {
                            warn!(id = %rejection.id, error = %e, "unregistered credential not saved");
                        }
                    }
                    if let Err(e) = store.record_rejection(&rejection).await {
                        warn!(id = %rejection.id, error = %e, "rejection not saved");
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_core::{CredentialRecord, DecisionSource, StoreError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        checkins: Mutex<Vec<Checkin>>,
        rejections: Mutex<Vec<Rejection>>,
        inserted: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl CredentialStore for RecordingStore {
        async fn fetch(&self, _id: &str) -> Result<Option<CredentialRecord>, StoreError> {
            Ok(None)
        }

        async fn insert_unregistered(&self, id: &str) -> Result<(), StoreError> {
            self.inserted.lock().unwrap().push(id.to_string());
            Ok(())
        }

        async fn record_checkin(&self, checkin: &Checkin) -> Result<(), StoreError> {
            self.checkins.lock().unwrap().push(checkin.clone());
            Ok(())
        }

        async fn record_rejection(&self, rejection: &Rejection) -> Result<(), StoreError> {
            self.rejections.lock().unwrap().push(rejection.clone());
            Ok(())
        }

        async fn list_all(&self) -> Result<Vec<CredentialRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    async fn settle() {
        // Let the spawned audit task run to completion
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_admit_writes_single_checkin() {
        let store = Arc::new(RecordingStore::default());
        let audit = AuditRecorder::new(store.clone());

        audit.record(
            "04AB11",
            &AccessDecision::Admit {
                holder: "Sam Vimes".to_string(),
                source: DecisionSource::Cache,
            },
        );
        settle().await;

        let checkins = store.checkins.lock().unwrap();
        assert_eq!(checkins.len(), 1);
        assert_eq!(checkins[0].name, "Sam Vimes");
        assert!(store.rejections.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deny_writes_single_rejection() {
        let store = Arc::new(RecordingStore::default());
        let audit = AuditRecorder::new(store.clone());

        audit.record(
            "04AB11",
            &AccessDecision::Deny {
                reason: "membership lapsed".to_string(),
                holder: Some("Sam Vimes".to_string()),
                validity: Some("activeMember".to_string()),
                escalate: true,
                source: Some(DecisionSource::Cache),
            },
        );
        settle().await;

        let rejections = store.rejections.lock().unwrap();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].id, "04AB11");
        assert_eq!(rejections[0].holder.as_deref(), Some("Sam Vimes"));
        assert_eq!(rejections[0].validity, "activeMember");
        assert!(store.checkins.lock().unwrap().is_empty());
        assert!(store.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_deny_also_inserts_minimal_record() {
        let store = Arc::new(RecordingStore::default());
        let audit = AuditRecorder::new(store.clone());

        audit.record("DEAD99", &AccessDecision::deny_unregistered());
        settle().await;

        assert_eq!(store.inserted.lock().unwrap().as_slice(), ["DEAD99"]);
        let rejections = store.rejections.lock().unwrap();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].validity, "unregistered");
    }

    #[tokio::test]
    async fn test_unavailable_deny_keeps_failure_marker() {
        let store = Arc::new(RecordingStore::default());
        let audit = AuditRecorder::new(store.clone());

        audit.record("04AB11", &AccessDecision::deny_unavailable());
        settle().await;

        // A failed check is not an unknown credential: no registration
        // insert, and the rejection says the check was unavailable
        assert!(store.inserted.lock().unwrap().is_empty());
        let rejections = store.rejections.lock().unwrap();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].validity, "unavailable");
    }
}
