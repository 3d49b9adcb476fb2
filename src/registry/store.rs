//! Durable record store abstraction.
//!
//! The registry is written against this trait rather than a concrete
//! persistence format. Implementations must complete in bounded time and
//! fail fast with [`StorageError`] when the backing store is unavailable;
//! the registry never retries silently.

use std::collections::HashMap;

use thiserror::Error;

use super::record::{ArtifactRecord, RecordId};

/// Infrastructure failures from the durable store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store for artifact records.
///
/// Keyed by record id with a secondary lookup over `lookup_key`. Single-record
/// operations are atomic; callers (the registry) provide mutual exclusion for
/// read-modify-write sequences.
pub trait RecordStore: Send {
    /// Fetch a copy of the record with the given id.
    fn get(&self, id: &RecordId) -> Result<Option<ArtifactRecord>, StorageError>;

    /// Fetch a copy of the record with the given lookup key.
    fn find_by_key(&self, key: &str) -> Result<Option<ArtifactRecord>, StorageError>;

    /// Insert or replace a record.
    fn put(&mut self, record: ArtifactRecord) -> Result<(), StorageError>;

    /// Remove a record; returns whether it existed.
    fn remove(&mut self, id: &RecordId) -> Result<bool, StorageError>;

    /// Copies of all records, in no particular order.
    fn scan(&self) -> Result<Vec<ArtifactRecord>, StorageError>;
}

/// In-memory store backed by a hash map, with a lookup-key index.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<RecordId, ArtifactRecord>,
    by_key: HashMap<String, RecordId>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, id: &RecordId) -> Result<Option<ArtifactRecord>, StorageError> {
        Ok(self.records.get(id).cloned())
    }

    fn find_by_key(&self, key: &str) -> Result<Option<ArtifactRecord>, StorageError> {
        Ok(self
            .by_key
            .get(key)
            .and_then(|id| self.records.get(id))
            .cloned())
    }

    fn put(&mut self, record: ArtifactRecord) -> Result<(), StorageError> {
        // Keep the key index consistent when a record's key changes.
        if let Some(old) = self.records.get(&record.id) {
            if old.lookup_key != record.lookup_key {
                self.by_key.remove(&old.lookup_key);
            }
        }
        self.by_key.insert(record.lookup_key.clone(), record.id.clone());
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn remove(&mut self, id: &RecordId) -> Result<bool, StorageError> {
        match self.records.remove(id) {
            Some(old) => {
                // Only drop the index entry if it still points at this record.
                if self.by_key.get(&old.lookup_key) == Some(id) {
                    self.by_key.remove(&old.lookup_key);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn scan(&self) -> Result<Vec<ArtifactRecord>, StorageError> {
        Ok(self.records.values().cloned().collect())
    }
}
