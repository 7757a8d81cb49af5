//! Idempotency record storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A stored result. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord<T> {
    /// The idempotency key.
    pub key: String,
    /// The stored result.
    pub result: T,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

impl<T> IdempotencyRecord<T> {
    /// Creates a record stamped with the current time.
    pub fn new(key: impl Into<String>, result: T) -> Self {
        Self {
            key: key.into(),
            result,
            created_at: Utc::now(),
        }
    }
}

/// Storage backend for idempotency records.
///
/// Implementations must be safe to share across tasks, and
/// `set_if_absent` must be atomic against every other writer of the same
/// backing store, including other processes.
#[async_trait]
pub trait IdempotencyStore<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Gets the record for `key`, if one was written.
    async fn get(&self, key: &str) -> Option<IdempotencyRecord<T>>;

    /// Writes `result` under `key` unless a record already exists.
    ///
    /// Returns whether this call's write took effect.
    async fn set_if_absent(&self, key: &str, result: T) -> bool;

    /// Returns true if a record exists for `key`.
    async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }
}

/// Process-local store backed by a sharded map.
#[derive(Debug)]
pub struct InMemoryIdempotencyStore<T> {
    entries: DashMap<String, IdempotencyRecord<T>>,
}

impl<T> Default for InMemoryIdempotencyStore<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> InMemoryIdempotencyStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every record.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl<T> IdempotencyStore<T> for InMemoryIdempotencyStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<IdempotencyRecord<T>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    async fn set_if_absent(&self, key: &str, result: T) -> bool {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(IdempotencyRecord::new(key, result));
                true
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}
