use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::common::clock::{Clock, SystemClock};
use crate::common::types::Endpoint;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Unix time (secs) at which the endpoint was marked down.
    LastFailure,
    /// Failure events seen since the endpoint was last marked down.
    ConsecutiveFailures,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FailureKey {
    pub kind: FailureKind,
    pub endpoint: Endpoint,
}

impl FailureKey {
    pub fn last_failure(endpoint: &Endpoint) -> Self {
        Self {
            kind: FailureKind::LastFailure,
            endpoint: endpoint.clone(),
        }
    }

    pub fn consecutive_failures(endpoint: &Endpoint) -> Self {
        Self {
            kind: FailureKind::ConsecutiveFailures,
            endpoint: endpoint.clone(),
        }
    }
}

/// TTL key/value cache holding failure history.
///
/// `get` on a missing or expired key is `Ok(None)`; `delete` on a missing key
/// is a no-op. An `Err` means the backend itself is unreachable.
pub trait FailureStore: Send + Sync {
    fn get(&self, key: &FailureKey) -> Result<Option<u64>, StoreError>;

    /// Stores `value`, restarting the TTL. `None` never expires.
    fn set(&self, key: &FailureKey, value: u64, ttl: Option<Duration>) -> Result<(), StoreError>;

    fn delete(&self, key: &FailureKey) -> Result<(), StoreError>;

    /// Adds one to the counter at `key` (absent counts as zero) and returns
    /// the new value. Stores that can do this atomically should override it.
    fn increment(&self, key: &FailureKey, ttl: Option<Duration>) -> Result<u64, StoreError> {
        let next = self.get(key)?.unwrap_or(0).saturating_add(1);
        self.set(key, next, ttl)?;
        Ok(next)
    }
}

impl<S: FailureStore + ?Sized> FailureStore for Arc<S> {
    fn get(&self, key: &FailureKey) -> Result<Option<u64>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &FailureKey, value: u64, ttl: Option<Duration>) -> Result<(), StoreError> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &FailureKey) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn increment(&self, key: &FailureKey, ttl: Option<Duration>) -> Result<u64, StoreError> {
        (**self).increment(key, ttl)
    }
}

/// Forgets everything. Every endpoint always looks healthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFailureStore;

impl FailureStore for NoopFailureStore {
    fn get(&self, _key: &FailureKey) -> Result<Option<u64>, StoreError> {
        Ok(None)
    }

    fn set(&self, _key: &FailureKey, _value: u64, _ttl: Option<Duration>) -> Result<(), StoreError> {
        Ok(())
    }

    fn delete(&self, _key: &FailureKey) -> Result<(), StoreError> {
        Ok(())
    }

    fn increment(&self, _key: &FailureKey, _ttl: Option<Duration>) -> Result<u64, StoreError> {
        Ok(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: u64,
    expires_at: Option<u64>,
}

impl Entry {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process store. Clones share the same entries, so several selectors
/// can pool their failure history.
#[derive(Clone)]
pub struct MemoryFailureStore {
    entries: Arc<DashMap<FailureKey, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryFailureStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn expiry(&self, ttl: Option<Duration>) -> Option<u64> {
        ttl.map(|ttl| self.clock.now().saturating_add(ttl.as_secs()))
    }
}

impl Default for MemoryFailureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryFailureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFailureStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl FailureStore for MemoryFailureStore {
    fn get(&self, key: &FailureKey) -> Result<Option<u64>, StoreError> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value)),
            Some(_) => true,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(None)
    }

    fn set(&self, key: &FailureKey, value: u64, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = self.expiry(ttl);
        self.entries.insert(key.clone(), Entry { value, expires_at });
        Ok(())
    }

    fn delete(&self, key: &FailureKey) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn increment(&self, key: &FailureKey, ttl: Option<Duration>) -> Result<u64, StoreError> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut entry = self.entries.entry(key.clone()).or_insert(Entry {
            value: 0,
            expires_at,
        });
        if entry.is_expired(now) {
            entry.value = 0;
        }
        entry.value = entry.value.saturating_add(1);
        entry.expires_at = expires_at;
        Ok(entry.value)
    }
}
