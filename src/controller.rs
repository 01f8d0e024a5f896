//! Reactive cache controller - the entry point for consumers and workers.
//!
//! Consumers call [`ReactiveCache::read_with_trigger`]: it serves whatever value
//! is stored while the subject is alive, then keeps the subject alive and asks
//! for a recompute. Workers call [`ReactiveCache::compute_cycle`] for each
//! refresh job: it computes under the lease and queues the next cycle for as
//! long as reads keep coming.

use crate::backend::CacheBackend;
use crate::config::ReactiveConfig;
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::lease::{LeaseGuard, LeaseManager};
use crate::liveness::LivenessTracker;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::queue::JobQueue;
use crate::scheduler::Scheduler;
use crate::serialization::{deserialize_from_cache, serialize_for_cache};
use crate::state::SubjectState;
use crate::subject::ReactiveSubject;
use std::sync::Arc;
use std::time::Instant;

/// Core reactive cache for one subject type.
///
/// Cheap to clone: every clone shares the same store, lease manager, queue and
/// metrics.
///
/// # Example
///
/// ```ignore
/// use reactive_cache::{ChannelQueue, InMemoryBackend, ReactiveCache};
///
/// let backend = InMemoryBackend::new();
/// let (queue, jobs) = ChannelQueue::new();
/// let cache = ReactiveCache::<Environment, _, _, _>::new(backend.clone(), backend, queue)?;
///
/// let pods = cache
///     .read_with_trigger(&environment, |pods| pods.len())
///     .await?;
/// ```
pub struct ReactiveCache<S, B, L, Q>
where
    S: ReactiveSubject,
    B: CacheBackend,
    L: LeaseManager,
    Q: JobQueue,
{
    backend: B,
    liveness: LivenessTracker<B>,
    leases: LeaseGuard<L>,
    scheduler: Scheduler<Q>,
    config: ReactiveConfig<S>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<S, B, L, Q> ReactiveCache<S, B, L, Q>
where
    S: ReactiveSubject,
    B: CacheBackend,
    L: LeaseManager,
    Q: JobQueue,
{
    /// Create a controller using the subject type's own configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `S::config()` does not validate.
    pub fn new(backend: B, leases: L, queue: Q) -> Result<Self> {
        Self::with_config(backend, leases, queue, S::config())
    }

    /// Create a controller with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `config` does not validate.
    pub fn with_config(
        backend: B,
        leases: L,
        queue: Q,
        config: ReactiveConfig<S>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "Reactive cache for {} (refresh: {:?}, lifetime: {:?}, lease: {:?})",
            S::subject_type(),
            config.refresh_interval,
            config.lifetime,
            config.lease_timeout
        );

        Ok(ReactiveCache {
            liveness: LivenessTracker::new(backend.clone()),
            backend,
            leases: LeaseGuard::new(leases),
            scheduler: Scheduler::new(queue),
            config,
            metrics: Arc::new(NoOpMetrics),
        })
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &ReactiveConfig<S> {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Read the subject's value and keep it fresh.
    ///
    /// If the subject is alive and a value is stored, `handler` is called with
    /// it and its result returned as `Some`. A dormant or still warming subject
    /// yields `None` without calling `handler`.
    ///
    /// Whatever the lookup found, the liveness marker is then extended and a
    /// compute cycle is queued, so repeated reads keep the refresh chain
    /// running. This happens before `handler` runs.
    ///
    /// # Errors
    ///
    /// - `Error::BackendError`: Value store unavailable
    /// - `Error::DeserializationError`, `Error::InvalidCacheEntry`,
    ///   `Error::VersionMismatch`: Stored bytes could not be decoded
    /// - `Error::QueueError`: The compute cycle could not be queued
    ///
    /// Lookup errors take precedence over errors from the refresh. When the
    /// refresh fails, `handler` is not called.
    pub async fn read_with_trigger<F, R>(&self, subject: &S, handler: F) -> Result<Option<R>>
    where
        F: FnOnce(S::Value) -> R,
    {
        let timer = Instant::now();
        let key = CacheKeyBuilder::base_key(subject, &self.config);
        debug!("» Reactive read for {}", key);

        let looked_up = self.lookup(subject, &key).await;
        let refreshed = self.refresh(subject).await;

        match (looked_up, refreshed) {
            (Err(e), refreshed) => {
                if let Err(refresh_err) = refreshed {
                    warn!("Refresh of {} also failed: {}", key, refresh_err);
                }
                self.metrics.record_error(&key, &e.to_string());
                Err(e)
            }
            (Ok(_), Err(e)) => {
                self.metrics.record_error(&key, &e.to_string());
                Err(e)
            }
            (Ok(Some(value)), Ok(())) => {
                self.metrics.record_hit(&key, timer.elapsed());
                Ok(Some(handler(value)))
            }
            (Ok(None), Ok(())) => {
                self.metrics.record_miss(&key, timer.elapsed());
                Ok(None)
            }
        }
    }

    /// [`read_with_trigger`](Self::read_with_trigger) returning the value itself.
    pub async fn read(&self, subject: &S) -> Result<Option<S::Value>> {
        self.read_with_trigger(subject, |value| value).await
    }

    /// Run one compute cycle. Driven by the worker for each refresh job.
    ///
    /// Returns `Ok(())` at once if another cycle for the same subject holds the
    /// lease, and ends the refresh chain (no compute, no reschedule) if the
    /// subject is no longer alive. Otherwise the value is computed, the next
    /// cycle is queued after the refresh interval, and the value is stored.
    ///
    /// # Errors
    ///
    /// - `Error::LeaseError`: Lease manager could not execute
    /// - `Error::BackendError`: Value store unavailable
    /// - Any error from `calculate` (after the next cycle was queued)
    /// - `Error::ValueTooLarge`: Value not stored (next cycle already queued)
    /// - `Error::QueueError`: Next cycle not queued (value still stored)
    pub async fn compute_cycle(&self, subject: &S) -> Result<()> {
        let key = CacheKeyBuilder::base_key(subject, &self.config);

        let outcome = self
            .leases
            .with_lease(&key, self.config.lease_timeout, || {
                self.compute_locked(subject, &key)
            })
            .await;

        match outcome {
            Ok(Some(())) => Ok(()),
            Ok(None) => {
                self.metrics.record_skipped(&key);
                Ok(())
            }
            Err(e) => {
                self.metrics.record_error(&key, &e.to_string());
                Err(e)
            }
        }
    }

    /// Delete the stored value and the liveness marker.
    ///
    /// The next read behaves like the very first one. A refresh job already in
    /// the queue finds the subject dormant and ends the chain.
    pub async fn clear(&self, subject: &S) -> Result<()> {
        let key = CacheKeyBuilder::base_key(subject, &self.config);
        self.backend.delete(&key).await?;
        self.liveness.forget(subject, &self.config).await?;
        debug!("Cleared {}", key);
        Ok(())
    }

    /// Current lifecycle state, derived from the store.
    pub async fn state(&self, subject: &S) -> Result<SubjectState> {
        if !self.liveness.is_alive(subject, &self.config).await? {
            return Ok(SubjectState::Dormant);
        }
        let key = CacheKeyBuilder::base_key(subject, &self.config);
        let has_value = self.backend.exists(&key).await?;
        Ok(SubjectState::from_parts(true, has_value))
    }

    async fn lookup(&self, subject: &S, key: &str) -> Result<Option<S::Value>> {
        if !self.liveness.is_alive(subject, &self.config).await? {
            debug!("✗ {} is dormant", key);
            return Ok(None);
        }

        match self.backend.get(key).await? {
            Some(bytes) => {
                debug!("✓ {} is warm", key);
                deserialize_from_cache(&bytes).map(Some)
            }
            None => {
                debug!("✗ {} is warming", key);
                Ok(None)
            }
        }
    }

    async fn refresh(&self, subject: &S) -> Result<()> {
        self.liveness.mark_alive(subject, &self.config).await?;
        self.scheduler.enqueue_now(subject).await
    }

    async fn compute_locked(&self, subject: &S, key: &str) -> Result<()> {
        if !self.liveness.is_alive(subject, &self.config).await? {
            debug!("{} is no longer read, ending refresh chain", key);
            self.metrics.record_dormant(key);
            return Ok(());
        }

        let timer = Instant::now();
        let computed = subject.calculate().await;
        let rescheduled = self
            .scheduler
            .enqueue_after(self.config.refresh_interval, subject)
            .await;

        let stored = match computed {
            Ok(value) => self.store(subject, key, &value).await,
            Err(e) => Err(e),
        };

        match (stored, rescheduled) {
            (Ok(()), rescheduled) => {
                self.metrics.record_compute(key, timer.elapsed());
                info!("✓ Computed {} in {:?}", key, timer.elapsed());
                rescheduled
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(reschedule_err)) => {
                warn!(
                    "Next cycle for {} not queued after failed compute: {}",
                    key, reschedule_err
                );
                Err(e)
            }
        }
    }

    async fn store(&self, subject: &S, key: &str, value: &S::Value) -> Result<()> {
        let bytes = serialize_for_cache(value)?;
        if let Some(limit) = self.config.max_value_bytes {
            if bytes.len() > limit {
                warn!(
                    "Value for {} is {} bytes, over the {} byte limit",
                    key,
                    bytes.len(),
                    limit
                );
                return Err(Error::ValueTooLarge {
                    size: bytes.len(),
                    limit,
                });
            }
        }

        let previous = self.backend.get(key).await?;
        let changed = previous.as_deref() != Some(bytes.as_slice());
        self.backend.set(key, bytes, None).await?;

        if changed {
            debug!("Value for {} changed", key);
            subject.on_value_updated(value);
        }
        Ok(())
    }
}

impl<S, B, L, Q> Clone for ReactiveCache<S, B, L, Q>
where
    S: ReactiveSubject,
    B: CacheBackend,
    L: LeaseManager,
    Q: JobQueue,
{
    fn clone(&self) -> Self {
        ReactiveCache {
            backend: self.backend.clone(),
            liveness: self.liveness.clone(),
            leases: self.leases.clone(),
            scheduler: self.scheduler.clone(),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}
