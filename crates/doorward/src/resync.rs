//! Periodic full resync of the local cache
//!
//! Streams every record from the remote store and overwrites the matching
//! cache entry, independent of live scan traffic. A failed sweep is simply
//! retried at the next interval; partial sweeps are fine since later
//! sweeps self-heal.

use std::sync::Arc;
use std::time::Duration;

use access_core::{CredentialCache, CredentialStore, StoreError};
use tracing::{info, warn};

/// Background task that keeps the cache in sync with the store.
pub async fn resync_task(
    cache: CredentialCache,
    store: Arc<dyn CredentialStore>,
    interval: Duration,
) {
    info!(?interval, "starting credential resync task");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        // First tick fires immediately, giving a warm cache at startup
        ticker.tick().await;

        match sweep(&cache, store.as_ref()).await {
            Ok(count) => info!(count, "credential cache resynced"),
            Err(e) => warn!(error = %e, "resync sweep failed, retrying next interval"),
        }
    }
}

/// One full sweep: fetch every record and upsert it into the cache.
/// Returns the number of records refreshed.
pub async fn sweep(
    cache: &CredentialCache,
    store: &dyn CredentialStore,
) -> Result<usize, StoreError> {
    let records = store.list_all().await?;

    let mut count = 0;
    for record in &records {
        match cache.set(record) {
            Ok(()) => count += 1,
            // A single bad write should not abort the sweep
            Err(e) => warn!(credential = %record.id, error = %e, "cache refresh failed for record"),
        }
    }

    Ok(count)
}
