//! Liveness marker management.
//!
//! A subject is alive while its `base:alive` marker exists in the value store.
//! Every read re-writes the marker with TTL = lifetime; nothing else ever ends
//! liveness except the store expiring the marker (or an explicit clear).

use crate::backend::CacheBackend;
use crate::config::ReactiveConfig;
use crate::error::Result;
use crate::key::CacheKeyBuilder;
use crate::serialization::serialize_for_cache;
use crate::subject::ReactiveSubject;

#[derive(Clone)]
pub struct LivenessTracker<B: CacheBackend> {
    backend: B,
}

impl<B: CacheBackend> LivenessTracker<B> {
    pub fn new(backend: B) -> Self {
        LivenessTracker { backend }
    }

    /// Write (or extend) the liveness marker for one full lifetime.
    ///
    /// # Errors
    /// Propagates value store errors.
    pub async fn mark_alive<S: ReactiveSubject>(
        &self,
        subject: &S,
        config: &ReactiveConfig<S>,
    ) -> Result<()> {
        let key = CacheKeyBuilder::alive_key(subject, config);
        let marker = serialize_for_cache(&true)?;
        self.backend.set(&key, marker, Some(config.lifetime)).await?;
        debug!("{} marked alive for {:?}", key, config.lifetime);
        Ok(())
    }

    /// Whether the marker is present and unexpired. Always reads through.
    ///
    /// # Errors
    /// Propagates value store errors.
    pub async fn is_alive<S: ReactiveSubject>(
        &self,
        subject: &S,
        config: &ReactiveConfig<S>,
    ) -> Result<bool> {
        let key = CacheKeyBuilder::alive_key(subject, config);
        self.backend.exists(&key).await
    }

    /// Drop the marker. Only used when clearing a subject.
    pub async fn forget<S: ReactiveSubject>(
        &self,
        subject: &S,
        config: &ReactiveConfig<S>,
    ) -> Result<()> {
        let key = CacheKeyBuilder::alive_key(subject, config);
        self.backend.delete(&key).await
    }
}
