//! Disk-backed credential cache
//!
//! Process-local key/value store over redb, keyed by credential id. The
//! decision path reads it without any network wait; the resync sweep and
//! the miss-path backfill overwrite entries. Entries are never deleted
//! individually, so the cache grows to at most the store's record count.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::store::CredentialRecord;

/// Key: credential id. Value: JSON-encoded [`CredentialRecord`].
const CREDENTIALS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("credentials");

/// Errors from cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Database error.
    #[error("cache database error: {0}")]
    Database(String),

    /// Record failed to encode or decode.
    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<redb::DatabaseError> for CacheError {
    fn from(err: redb::DatabaseError) -> Self {
        CacheError::Database(err.to_string())
    }
}

impl From<redb::TransactionError> for CacheError {
    fn from(err: redb::TransactionError) -> Self {
        CacheError::Database(err.to_string())
    }
}

impl From<redb::TableError> for CacheError {
    fn from(err: redb::TableError) -> Self {
        CacheError::Database(err.to_string())
    }
}

impl From<redb::StorageError> for CacheError {
    fn from(err: redb::StorageError) -> Self {
        CacheError::Database(err.to_string())
    }
}

impl From<redb::CommitError> for CacheError {
    fn from(err: redb::CommitError) -> Self {
        CacheError::Database(err.to_string())
    }
}

/// Disk-backed credential cache.
///
/// Cheap to clone; clones share the same database handle, so the scan path
/// and the resync sweep can hold one each. Writes are idempotent upserts
/// with last-write-wins semantics per key.
#[derive(Clone)]
pub struct CredentialCache {
    db: Arc<Database>,
}

impl CredentialCache {
    /// Open the cache at the given path, creating the backing file and
    /// table if absent. Idempotent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CacheError::Database(e.to_string()))?;
            }
        }
        let db = Database::create(path)?;

        // Ensure the table exists so a get before any set succeeds
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CREDENTIALS_TABLE)?;
        }
        write_txn.commit()?;

        debug!(path = %path.display(), "opened credential cache");
        Ok(Self { db: Arc::new(db) })
    }

    /// Look up a credential by id. `Ok(None)` means miss. Pure disk read,
    /// never touches the network.
    pub fn get(&self, id: &str) -> Result<Option<CredentialRecord>, CacheError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Upsert a record under its credential id.
    pub fn set(&self, record: &CredentialRecord) -> Result<(), CacheError> {
        let encoded = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIALS_TABLE)?;
            table.insert(record.id.as_str(), encoded.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Number of cached credentials.
    pub fn len(&self) -> Result<u64, CacheError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS_TABLE)?;
        let mut count = 0u64;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}
