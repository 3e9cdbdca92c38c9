//! access-core: Core authorization library for the doorward entry controller
//!
//! This crate decides whether a scanned credential may open the door,
//! independently of how the scan arrives or where records live.
//!
//! # Features
//!
//! - **Disk-backed cache**: redb-backed credential cache for network-free
//!   lookups on the hit path
//! - **Standing evaluation**: validity check plus a time-bounded leniency
//!   window after expiry
//! - **Store fallback**: remote record fetch on a cache miss, with cache
//!   backfill
//! - **Fail-closed**: denies when cache or store access fails
//!
//! # Example
//!
//! ```rust,ignore
//! use access_core::{authorize, CredentialCache, EngineConfig, NoopMetrics};
//!
//! let cache = CredentialCache::open("/var/lib/doorward/credentials.redb")?;
//! let config = EngineConfig::default();
//!
//! let decision = authorize("04AB11C2", &config, &cache, &store, &NoopMetrics).await;
//! if decision.is_admitted() {
//!     println!("open the door");
//! }
//! ```

pub mod cache;
pub mod decision;
pub mod store;

// Re-export public types
pub use cache::{CacheError, CredentialCache};
pub use decision::{
    authorize, evaluate_standing, now_millis, AccessDecision, DecisionMetrics, DecisionSource,
    EngineConfig, NoopMetrics,
};
pub use store::{Checkin, CredentialRecord, CredentialStore, Rejection, StoreError, Validity};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheError, CredentialCache};
    pub use crate::decision::{
        authorize, evaluate_standing, now_millis, AccessDecision, DecisionMetrics, DecisionSource,
        EngineConfig, NoopMetrics,
    };
    pub use crate::store::{
        Checkin, CredentialRecord, CredentialStore, Rejection, StoreError, Validity,
    };
}
