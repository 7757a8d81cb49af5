//! Per-key async locks.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Issues one lock per key, created on first use.
///
/// The map itself is only touched for the instant it takes to fetch or
/// insert an entry; waiting happens on the per-key mutex. Entries nobody
/// holds or waits on are dropped when the last [`KeyLock`] is released.
#[derive(Debug, Default, Clone)]
pub struct KeyedLockRegistry {
    locks: Arc<LockMap>,
}

/// Exclusive hold on one key. Released on drop.
#[derive(Debug)]
pub struct KeyLock {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl KeyLock {
    /// The key this lock guards.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune(&self.locks, &self.key);
    }
}

fn prune(locks: &LockMap, key: &str) {
    locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
}

impl KeyedLockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.entry(key.to_string()).or_default().clone()
    }

    /// Waits until the key is free and takes it.
    pub async fn acquire(&self, key: &str) -> KeyLock {
        let guard = self.lock_for(key).lock_owned().await;
        KeyLock {
            key: key.to_string(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up after `wait`.
    pub async fn acquire_timeout(&self, key: &str, wait: Duration) -> Option<KeyLock> {
        let acquired = tokio::time::timeout(wait, self.lock_for(key).lock_owned()).await;
        match acquired {
            Ok(guard) => Some(KeyLock {
                key: key.to_string(),
                guard: Some(guard),
                locks: Arc::clone(&self.locks),
            }),
            Err(_) => {
                prune(&self.locks, key);
                None
            }
        }
    }

    /// Number of keys currently held or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no key is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
