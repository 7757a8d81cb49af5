//! Idempotency gate: at most one execution per content-derived key.
//!
//! A payload is reduced to a key by [`KeyDeriver`]. The [`IdempotencyGate`]
//! checks the [`IdempotencyStore`] without a lock, then re-checks under a
//! per-key lock from the [`KeyedLockRegistry`] before running the work, so
//! concurrent deliveries of one payload run it once while unrelated payloads
//! never wait on each other.

mod gate;
mod key;
mod locks;
mod store;

pub use gate::{IdempotencyGate, ProcessingRecord};
pub use key::KeyDeriver;
pub use locks::{KeyLock, KeyedLockRegistry};
pub use store::{IdempotencyRecord, IdempotencyStore, InMemoryIdempotencyStore};
