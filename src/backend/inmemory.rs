//! In-memory value store and lease manager (default, thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! Expiry is checked on access against the tokio clock, so paused-clock tests
//! can move time forward deterministically.

use super::CacheBackend;
use crate::error::Result;
use crate::lease::{LeaseManager, LeaseToken};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline `after` from now, or `None` when it lies beyond what the clock
/// can represent (treated as never expiring).
fn deadline(after: Duration) -> Option<Instant> {
    Instant::now().checked_add(after)
}

/// In-memory entry with optional expiration.
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.and_then(deadline);
        CacheEntry { data, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// A lease held in this process.
struct LeaseEntry {
    token: LeaseToken,
    expires_at: Option<Instant>,
}

impl LeaseEntry {
    fn new(timeout: Duration) -> Self {
        LeaseEntry {
            token: LeaseToken::generate(),
            expires_at: deadline(timeout),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Thread-safe async in-memory value store that doubles as a lease manager.
///
/// Clones share the same storage, so one instance can serve as the value store
/// and the lease manager of a `ReactiveCache`. Mutual exclusion only holds
/// within this process; use the Redis backend across processes.
///
/// # Example
///
/// ```no_run
/// use reactive_cache::backend::{InMemoryBackend, CacheBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend.set("key1", b"value".to_vec(), None).await?;
///     assert!(backend.get("key1").await?.is_some());
///
///     backend.set("key2", b"expires".to_vec(), Some(Duration::from_secs(300))).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, CacheEntry>>,
    leases: Arc<DashMap<String, LeaseEntry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of unexpired leases.
    pub fn active_leases(&self) -> usize {
        self.leases.iter().filter(|l| !l.is_expired()).count()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
        }

        self.store.remove_if(key, |_, entry| entry.is_expired());
        debug!("✓ InMemory GET {} -> MISS", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry::new(value, ttl);
        self.store.insert(key.to_string(), entry);

        if let Some(d) = ttl {
            debug!("✓ InMemory SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ InMemory SET {}", key);
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if self
            .store
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
        {
            return Ok(true);
        }

        self.store.remove_if(key, |_, entry| entry.is_expired());
        Ok(false)
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.store.remove(*key);
        }

        debug!("✓ InMemory MDELETE {} keys", keys.len());
        Ok(())
    }
}

impl LeaseManager for InMemoryBackend {
    async fn try_acquire(&self, key: &str, timeout: Duration) -> Result<Option<LeaseToken>> {
        match self.leases.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired() {
                    return Ok(None);
                }
                debug!("InMemory lease {} expired, taking over", key);
                let lease = LeaseEntry::new(timeout);
                let token = lease.token.clone();
                occupied.insert(lease);
                Ok(Some(token))
            }
            Entry::Vacant(vacant) => {
                let lease = LeaseEntry::new(timeout);
                let token = lease.token.clone();
                vacant.insert(lease);
                Ok(Some(token))
            }
        }
    }

    async fn release(&self, key: &str, token: &LeaseToken) -> Result<()> {
        if self
            .leases
            .remove_if(key, |_, lease| &lease.token == token)
            .is_none()
        {
            debug!("InMemory lease {} not held by this token, nothing to release", key);
        }
        Ok(())
    }
}
