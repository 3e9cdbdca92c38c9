//! Credential records and the remote record store contract
//!
//! The remote store is the source of truth for credentials. The decision
//! engine only talks to it through [`CredentialStore`], so the daemon can
//! plug in an HTTP-backed client and tests can plug in fixtures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Standing of a credential as recorded in the store.
///
/// Only `activeMember` and `nonMember` can admit. Every other value,
/// including operator-assigned states like `lost` or `expelled`, denies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Validity {
    ActiveMember,
    NonMember,
    Unregistered,
    /// Any other state string found in the store (e.g. "lost").
    Other(String),
}

impl Validity {
    /// Whether this state is one of the two admitting states.
    pub fn admits(&self) -> bool {
        matches!(self, Validity::ActiveMember | Validity::NonMember)
    }

    /// The wire representation of this state.
    pub fn as_str(&self) -> &str {
        match self {
            Validity::ActiveMember => "activeMember",
            Validity::NonMember => "nonMember",
            Validity::Unregistered => "unregistered",
            Validity::Other(s) => s,
        }
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Validity {
    fn from(s: String) -> Self {
        match s.as_str() {
            "activeMember" => Validity::ActiveMember,
            "nonMember" => Validity::NonMember,
            "unregistered" => Validity::Unregistered,
            _ => Validity::Other(s),
        }
    }
}

impl From<Validity> for String {
    fn from(v: Validity) -> Self {
        v.as_str().to_string()
    }
}

/// The authoritative record for one credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Opaque credential identifier reported by the scanner.
    pub id: String,
    /// Display name of the holder; absent only for never-before-seen
    /// credentials.
    #[serde(default)]
    pub holder: Option<String>,
    /// Recorded standing of the credential.
    pub validity: Validity,
    /// Expiry as unix epoch milliseconds; meaningful only for admitting
    /// states.
    #[serde(default)]
    pub expiry: i64,
}

impl CredentialRecord {
    /// Minimal record for a credential that has never been registered.
    ///
    /// A record without a holder must carry the `unregistered` state.
    pub fn unregistered(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            holder: None,
            validity: Validity::Unregistered,
            expiry: 0,
        }
    }
}

/// Audit entry written on every admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkin {
    pub name: String,
    /// Unix epoch milliseconds.
    pub time: i64,
}

/// Audit entry written on every denial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub id: String,
    /// Present only when a recorded holder was rejected.
    pub holder: Option<String>,
    /// Recorded state, or "unregistered" when the credential is unknown.
    pub validity: String,
    /// Unix epoch milliseconds.
    pub time: i64,
}

/// Errors from remote store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store unreachable, timed out, or returned a server error.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// Response body did not decode into the expected shape.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Store rejected the request outright (auth, bad request).
    #[error("record store rejected request: status {status}")]
    Rejected { status: u16 },
}

/// Contract with the remote record store.
///
/// Three logical collections: `credentials` (keyed by id), `checkins` and
/// `rejections` (both append-only). The store assigns document ids and
/// insertion timestamps server-side.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a credential record by id. `Ok(None)` means not registered.
    async fn fetch(&self, id: &str) -> Result<Option<CredentialRecord>, StoreError>;

    /// Insert a minimal record for an unknown credential so it can be
    /// registered manually later.
    async fn insert_unregistered(&self, id: &str) -> Result<(), StoreError>;

    /// Append a checkin to the audit trail.
    async fn record_checkin(&self, checkin: &Checkin) -> Result<(), StoreError>;

    /// Append a rejection to the audit trail.
    async fn record_rejection(&self, rejection: &Rejection) -> Result<(), StoreError>;

    /// Fetch every credential record, for the resync sweep.
    async fn list_all(&self) -> Result<Vec<CredentialRecord>, StoreError>;
}
