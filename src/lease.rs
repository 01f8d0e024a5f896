//! Exclusive, time-bounded leases.
//!
//! A lease is how the reactive cache guarantees single-flight computation: at
//! most one compute cycle per subject runs at any instant, across every process
//! sharing the lease manager.
//!
//! [`LeaseManager`] is the narrow interface to the external manager
//! (implemented by [`InMemoryBackend`](crate::backend::InMemoryBackend) and, with
//! the `redis` feature, `RedisBackend`). [`LeaseGuard`] turns it into a scoped
//! "run this body while holding the lease" operation.

use crate::error::Result;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Opaque proof of lease ownership.
///
/// Release only succeeds for the holder of the matching token, so a worker
/// whose lease already expired cannot release a lease taken over by another.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LeaseToken(String);

impl LeaseToken {
    /// Create a fresh random token.
    pub fn generate() -> Self {
        LeaseToken(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        LeaseToken(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait for lease manager implementations.
///
/// Acquisition must be atomic across all callers sharing the manager, and a
/// lease must disappear on its own once its timeout elapses.
pub trait LeaseManager: Send + Sync + Clone + 'static {
    /// Try to take the lease for `key` without waiting.
    ///
    /// # Returns
    /// - `Ok(Some(token))` - Lease acquired
    /// - `Ok(None)` - Someone else holds it
    ///
    /// # Errors
    /// Returns `Err` only if the manager could not execute the attempt.
    fn try_acquire(
        &self,
        key: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<LeaseToken>>> + Send;

    /// Release the lease for `key` if it is still held with `token`.
    ///
    /// # Errors
    /// Returns `Err` if the manager could not execute the release.
    fn release(&self, key: &str, token: &LeaseToken) -> impl Future<Output = Result<()>> + Send;
}

/// Scoped mutual exclusion per key.
#[derive(Clone)]
pub struct LeaseGuard<L: LeaseManager> {
    manager: L,
}

impl<L: LeaseManager> LeaseGuard<L> {
    pub fn new(manager: L) -> Self {
        LeaseGuard { manager }
    }

    pub fn manager(&self) -> &L {
        &self.manager
    }

    /// Run `body` while holding the lease for `key`.
    ///
    /// Returns `Ok(None)` without invoking `body` when the lease is held
    /// elsewhere. Otherwise the lease is released after `body` completes,
    /// whether it succeeded or failed. If the returned future is dropped while
    /// `body` is running, release is handed to the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - Errors from the lease manager itself
    /// - Errors returned by `body` (these win over a failed release)
    pub async fn with_lease<T, F, Fut>(
        &self,
        key: &str,
        timeout: Duration,
        body: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = match self.manager.try_acquire(key, timeout).await? {
            Some(token) => token,
            None => {
                debug!("Lease {} is held elsewhere", key);
                return Ok(None);
            }
        };
        debug!("✓ Lease {} acquired (timeout: {:?})", key, timeout);

        let mut held = HeldLease::new(self.manager.clone(), key, token);
        let outcome = body().await;
        let released = held.release().await;

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(Some(value)),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(
                    "Lease {} release failed after body error: {}",
                    key, release_err
                );
                Err(e)
            }
        }
    }
}

/// A lease currently owned by this process.
struct HeldLease<L: LeaseManager> {
    manager: L,
    key: String,
    token: LeaseToken,
    released: bool,
}

impl<L: LeaseManager> HeldLease<L> {
    fn new(manager: L, key: &str, token: LeaseToken) -> Self {
        HeldLease {
            manager,
            key: key.to_string(),
            token,
            released: false,
        }
    }

    async fn release(&mut self) -> Result<()> {
        self.released = true;
        self.manager.release(&self.key, &self.token).await?;
        debug!("✓ Lease {} released", self.key);
        Ok(())
    }
}

impl<L: LeaseManager> Drop for HeldLease<L> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                "Lease {} dropped outside a runtime; it will expire on its own",
                self.key
            );
            return;
        };

        let manager = self.manager.clone();
        let key = std::mem::take(&mut self.key);
        let token = self.token.clone();
        handle.spawn(async move {
            if let Err(e) = manager.release(&key, &token).await {
                warn!("Deferred release of lease {} failed: {}", key, e);
            }
        });
    }
}
