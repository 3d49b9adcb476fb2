//! Artifact registry: the durable mapping from lookup key to record.
//!
//! Owns creation, mutation, deletion, and expiry-based eviction. All
//! mutations run under a single global lock; at expected load this is
//! simpler than per-key locking and makes lost updates impossible. The
//! fetch path uses [`Registry::with_key_mut`], which runs its entire
//! check-and-increment sequence inside one critical section.
//!
//! Every read hands out an independent copy of the record; no caller holds
//! a reference into the store past the call that produced it.

mod record;
mod store;

pub use record::{ArtifactRecord, RecordId, Usage};
pub use store::{MemoryStore, RecordStore, StorageError};

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("lookup key '{key}' collides with a live record")]
    Conflict { key: String },

    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Thread-safe artifact registry over an abstract record store.
pub struct Registry {
    store: Mutex<Box<dyn RecordStore>>,
}

impl Registry {
    /// Create a registry over the given store.
    pub fn new(store: impl RecordStore + 'static) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
        }
    }

    /// Create a registry over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn RecordStore>>, StorageError> {
        self.store
            .lock()
            .map_err(|_| StorageError::Unavailable("registry lock poisoned".to_string()))
    }

    /// Insert a new record.
    ///
    /// Fails with [`RegistryError::Conflict`] when the lookup key is already
    /// held by a non-expired record. An expired holder does not block the
    /// key; the stale record is evicted on the spot.
    pub fn create(&self, record: ArtifactRecord, now: DateTime<Utc>) -> Result<RecordId, RegistryError> {
        let mut store = self.lock()?;
        if let Some(existing) = store.find_by_key(&record.lookup_key)? {
            if !existing.is_expired(now) {
                return Err(RegistryError::Conflict {
                    key: record.lookup_key,
                });
            }
            store.remove(&existing.id)?;
        }
        let id = record.id.clone();
        store.put(record)?;
        Ok(id)
    }

    /// Copy of the record with the given lookup key, expired or not.
    pub fn get_by_key(&self, key: &str) -> Result<Option<ArtifactRecord>, StorageError> {
        self.lock()?.find_by_key(key)
    }

    /// Copy of the record with the given id.
    pub fn get_by_id(&self, id: &RecordId) -> Result<Option<ArtifactRecord>, StorageError> {
        self.lock()?.get(id)
    }

    /// All records belonging to `owner`, ordered by creation time ascending.
    /// Ties break on id, so the order is stable.
    pub fn list_by_owner(&self, owner: &str) -> Result<Vec<ArtifactRecord>, StorageError> {
        let mut records: Vec<_> = self
            .lock()?
            .scan()?
            .into_iter()
            .filter(|r| r.owner == owner)
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    /// All records, ordered by creation time ascending. Role enforcement is
    /// the orchestration layer's job, not the registry's.
    pub fn list_all(&self) -> Result<Vec<ArtifactRecord>, StorageError> {
        let mut records = self.lock()?.scan()?;
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    /// Atomically read-modify-write one record by id.
    ///
    /// The mutator runs under the registry lock; it is responsible for
    /// recomputing the integrity tag whenever it changes the payload.
    /// A mutator that changes the lookup key is held to the same uniqueness
    /// rule as [`Registry::create`]; any other record holding the new key,
    /// expired or not, fails the update without writing.
    /// Returns a copy of the record after mutation.
    pub fn update(
        &self,
        id: &RecordId,
        mutator: impl FnOnce(&mut ArtifactRecord),
    ) -> Result<ArtifactRecord, RegistryError> {
        let mut store = self.lock()?;
        let mut record = store.get(id)?.ok_or(RegistryError::NotFound)?;
        let key_before = record.lookup_key.clone();
        mutator(&mut record);
        if record.lookup_key != key_before {
            if let Some(holder) = store.find_by_key(&record.lookup_key)? {
                if holder.id != record.id {
                    return Err(RegistryError::Conflict {
                        key: record.lookup_key,
                    });
                }
            }
        }
        store.put(record.clone())?;
        Ok(record)
    }

    /// Run a closure against the record with the given lookup key, inside
    /// one critical section.
    ///
    /// The closure may mutate the record; it is written back only if it
    /// actually changed, so a denied fetch leaves no trace in the store.
    /// This is the primitive the delivery path builds on: rate decision and
    /// counter increment happen against the same locked read, so two racing
    /// fetches cannot both pass against a stale `last_fetch`.
    pub fn with_key_mut<T>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&mut ArtifactRecord>) -> T,
    ) -> Result<T, StorageError> {
        let mut store = self.lock()?;
        match store.find_by_key(key)? {
            None => Ok(f(None)),
            Some(mut record) => {
                let before = record.clone();
                let out = f(Some(&mut record));
                if record != before {
                    store.put(record)?;
                }
                Ok(out)
            }
        }
    }

    /// Remove a record; returns whether it existed.
    pub fn delete(&self, id: &RecordId) -> Result<bool, StorageError> {
        self.lock()?.remove(id)
    }

    /// Remove every record whose expiry has passed. Idempotent and safe to
    /// call concurrently with any other operation; bounded by the number of
    /// records scanned.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut store = self.lock()?;
        let dead: Vec<RecordId> = store
            .scan()?
            .into_iter()
            .filter(|r| r.is_expired(now))
            .map(|r| r.id)
            .collect();
        let mut removed = 0;
        for id in &dead {
            if store.remove(id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Tier;
    use chrono::Duration;

    fn record(key: &str, owner: &str, expiry: DateTime<Utc>) -> ArtifactRecord {
        ArtifactRecord {
            id: RecordId::generate(),
            owner: owner.to_string(),
            lookup_key: key.to_string(),
            name: key.to_string(),
            payload: "print(1)".to_string(),
            integrity_tag: "00".to_string(),
            expiry,
            tier: Tier::None,
            usage: Usage::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let registry = Registry::in_memory();
        let now = Utc::now();
        let rec = record("k1", "alice", now + Duration::days(1));
        let id = registry.create(rec.clone(), now).unwrap();

        assert_eq!(registry.get_by_id(&id).unwrap(), Some(rec.clone()));
        assert_eq!(registry.get_by_key("k1").unwrap(), Some(rec));
    }

    #[test]
    fn test_create_conflict_on_live_key() {
        let registry = Registry::in_memory();
        let now = Utc::now();
        registry
            .create(record("k1", "alice", now + Duration::days(1)), now)
            .unwrap();

        let err = registry
            .create(record("k1", "bob", now + Duration::days(1)), now)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { .. }));
    }

    #[test]
    fn test_expired_holder_does_not_block_key() {
        let registry = Registry::in_memory();
        let now = Utc::now();
        let stale = record("k1", "alice", now - Duration::hours(1));
        let stale_id = stale.id.clone();
        registry.create(stale, now - Duration::days(1)).unwrap();

        registry
            .create(record("k1", "bob", now + Duration::days(1)), now)
            .unwrap();
        // The stale holder was evicted, not orphaned.
        assert_eq!(registry.get_by_id(&stale_id).unwrap(), None);
    }

    #[test]
    fn test_list_by_owner_sorted_and_filtered() {
        let registry = Registry::in_memory();
        let now = Utc::now();
        let mut first = record("a", "alice", now + Duration::days(1));
        first.created_at = now - Duration::minutes(2);
        let mut second = record("b", "alice", now + Duration::days(1));
        second.created_at = now - Duration::minutes(1);
        let other = record("c", "bob", now + Duration::days(1));

        // Insert out of order.
        registry.create(second.clone(), now).unwrap();
        registry.create(first.clone(), now).unwrap();
        registry.create(other, now).unwrap();

        let listed = registry.list_by_owner("alice").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].lookup_key, "a");
        assert_eq!(listed[1].lookup_key, "b");
    }

    #[test]
    fn test_update_returns_mutated_copy() {
        let registry = Registry::in_memory();
        let now = Utc::now();
        let id = registry
            .create(record("k1", "alice", now + Duration::days(1)), now)
            .unwrap();

        let updated = registry
            .update(&id, |r| r.name = "renamed".to_string())
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(registry.get_by_id(&id).unwrap().unwrap().name, "renamed");
    }

    #[test]
    fn test_update_key_change_respects_uniqueness() {
        let registry = Registry::in_memory();
        let now = Utc::now();
        let id = registry
            .create(record("k1", "alice", now + Duration::days(1)), now)
            .unwrap();
        registry
            .create(record("k2", "bob", now + Duration::days(1)), now)
            .unwrap();

        let err = registry
            .update(&id, |r| r.lookup_key = "k2".to_string())
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { .. }));
        // The failed update wrote nothing.
        assert_eq!(registry.get_by_id(&id).unwrap().unwrap().lookup_key, "k1");

        // Moving to a free key works and the old key stops resolving.
        registry
            .update(&id, |r| r.lookup_key = "k3".to_string())
            .unwrap();
        assert_eq!(registry.get_by_key("k3").unwrap().unwrap().id, id);
        assert!(registry.get_by_key("k1").unwrap().is_none());
    }

    #[test]
    fn test_update_missing_record() {
        let registry = Registry::in_memory();
        let err = registry
            .update(&RecordId::generate(), |_| {})
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound));
    }

    #[test]
    fn test_with_key_mut_writes_back_only_on_change() {
        let registry = Registry::in_memory();
        let now = Utc::now();
        let id = registry
            .create(record("k1", "alice", now + Duration::days(1)), now)
            .unwrap();

        // No mutation: usage stays untouched.
        registry
            .with_key_mut("k1", |rec| {
                assert!(rec.is_some());
            })
            .unwrap();
        assert_eq!(registry.get_by_id(&id).unwrap().unwrap().usage.fetch_count, 0);

        // Mutation: persisted.
        registry
            .with_key_mut("k1", |rec| {
                rec.unwrap().usage.fetch_count += 1;
            })
            .unwrap();
        assert_eq!(registry.get_by_id(&id).unwrap().unwrap().usage.fetch_count, 1);
    }

    #[test]
    fn test_with_key_mut_missing_key() {
        let registry = Registry::in_memory();
        let seen = registry
            .with_key_mut("ghost", |rec| rec.is_none())
            .unwrap();
        assert!(seen);
    }

    #[test]
    fn test_delete() {
        let registry = Registry::in_memory();
        let now = Utc::now();
        let id = registry
            .create(record("k1", "alice", now + Duration::days(1)), now)
            .unwrap();

        assert!(registry.delete(&id).unwrap());
        assert!(!registry.delete(&id).unwrap());
    }

    #[test]
    fn test_sweep_expired_is_idempotent() {
        let registry = Registry::in_memory();
        let base = Utc::now() - Duration::days(2);
        registry
            .create(record("dead1", "alice", base + Duration::hours(1)), base)
            .unwrap();
        registry
            .create(record("dead2", "alice", base + Duration::hours(1)), base)
            .unwrap();
        registry
            .create(record("live", "alice", Utc::now() + Duration::days(1)), base)
            .unwrap();

        let now = Utc::now();
        assert_eq!(registry.sweep_expired(now).unwrap(), 2);
        assert_eq!(registry.sweep_expired(now).unwrap(), 0);
        assert!(registry.get_by_key("live").unwrap().is_some());
    }

    #[test]
    fn test_sweep_treats_boundary_as_expired() {
        let registry = Registry::in_memory();
        let now = Utc::now();
        registry
            .create(record("edge", "alice", now), now - Duration::hours(1))
            .unwrap();
        assert_eq!(registry.sweep_expired(now).unwrap(), 1);
    }
}
