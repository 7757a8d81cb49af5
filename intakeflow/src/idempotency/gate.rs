//! Double-checked idempotency gate.

use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{IdempotencyRecord, IdempotencyStore, KeyDeriver, KeyLock, KeyedLockRegistry};
use crate::config::IdempotencyConfig;
use crate::errors::GateError;

/// Outcome of [`IdempotencyGate::process_once`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingRecord<T> {
    /// The fresh or stored result.
    pub result: T,
    /// True if `result` came from the store rather than from this call's work.
    pub was_replay: bool,
    /// The key the payload hashed to.
    pub idempotency_key: String,
}

/// Runs work at most once per payload key.
pub struct IdempotencyGate<T>
where
    T: Clone + Send + Sync + 'static,
{
    deriver: KeyDeriver,
    locks: KeyedLockRegistry,
    store: Arc<dyn IdempotencyStore<T>>,
    lock_wait: Option<Duration>,
}

impl<T> fmt::Debug for IdempotencyGate<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotencyGate")
            .field("deriver", &self.deriver)
            .field("locks_held", &self.locks.len())
            .field("lock_wait", &self.lock_wait)
            .finish_non_exhaustive()
    }
}

impl<T> IdempotencyGate<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a gate over `store` using the configured exclusions and lock wait.
    pub fn new(store: Arc<dyn IdempotencyStore<T>>, config: &IdempotencyConfig) -> Self {
        Self {
            deriver: KeyDeriver::new(config.excluded_fields.iter().cloned()),
            locks: KeyedLockRegistry::new(),
            store,
            lock_wait: config.lock_wait_timeout(),
        }
    }

    /// Overrides the lock wait limit. `None` waits forever.
    #[must_use]
    pub fn with_lock_wait(mut self, lock_wait: Option<Duration>) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    /// The key deriver in use.
    #[must_use]
    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    /// The per-key lock registry.
    #[must_use]
    pub fn locks(&self) -> &KeyedLockRegistry {
        &self.locks
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn IdempotencyStore<T>> {
        &self.store
    }

    /// Derives the key for a payload.
    #[must_use]
    pub fn derive_key(&self, payload: &Value) -> String {
        self.deriver.derive(payload)
    }

    /// Derives the key and reads the store without locking.
    pub async fn lookup(&self, payload: &Value) -> (String, Option<IdempotencyRecord<T>>) {
        let key = self.derive_key(payload);
        let record = self.store.get(&key).await;
        (key, record)
    }

    async fn lock(&self, key: &str) -> Option<KeyLock> {
        match self.lock_wait {
            None => Some(self.locks.acquire(key).await),
            Some(wait) => self.locks.acquire_timeout(key, wait).await,
        }
    }

    /// Runs `work` for `payload` unless a result for the same key is stored.
    ///
    /// Concurrent calls for one key run `work` once; the others wait for the
    /// key's lock and then replay the stored result. A failed `work` stores
    /// nothing, so the next call runs it again.
    ///
    /// # Errors
    ///
    /// [`GateError::LockTimeout`] if a lock wait limit is set and exceeded;
    /// [`GateError::Work`] with the work's own error otherwise.
    pub async fn process_once<F, Fut, E>(
        &self,
        payload: &Value,
        work: F,
    ) -> Result<ProcessingRecord<T>, GateError<E>>
    where
        F: FnOnce(Value) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let (key, stored) = self.lookup(payload).await;
        if let Some(record) = stored {
            debug!(idempotency_key = %key, "Idempotency hit on fast path");
            return Ok(replay(record));
        }

        let Some(lock) = self.lock(&key).await else {
            let waited_ms = self
                .lock_wait
                .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
            warn!(idempotency_key = %key, waited_ms, "Timed out waiting for idempotency lock");
            return Err(GateError::LockTimeout { key, waited_ms });
        };

        if let Some(record) = self.store.get(&key).await {
            debug!(idempotency_key = %key, "Idempotency hit after acquiring lock");
            return Ok(replay(record));
        }

        let result = work(payload.clone()).await.map_err(GateError::Work)?;

        if self.store.set_if_absent(&key, result.clone()).await {
            info!(idempotency_key = %key, "Stored idempotency record");
        } else {
            warn!(
                idempotency_key = %key,
                "Idempotency record already present at write; another writer got there first"
            );
        }
        drop(lock);

        Ok(ProcessingRecord {
            result,
            was_replay: false,
            idempotency_key: key,
        })
    }
}

fn replay<T>(record: IdempotencyRecord<T>) -> ProcessingRecord<T> {
    ProcessingRecord {
        result: record.result,
        was_replay: true,
        idempotency_key: record.key,
    }
}
