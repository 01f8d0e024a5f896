//! Metrics hooks for the read path and compute cycles.
//!
//! Implement [`CacheMetrics`] to feed your monitoring system:
//!
//! ```ignore
//! use reactive_cache::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_compute(&self, _key: &str, duration: Duration) {
//!         // histogram!("reactive_cache_compute_seconds").record(duration);
//!     }
//!     // ... other methods keep their logging defaults
//! }
//!
//! // let cache = ReactiveCache::new(backend.clone(), backend, queue)?
//! //     .with_metrics(Arc::new(PrometheusMetrics));
//! ```
//!
//! Default trait methods log through the `log` crate. `NoOpMetrics`, the
//! default for new caches, discards everything.
//!
//! | Hook | Fired when |
//! |------|------------|
//! | `record_hit` | A read found the subject alive with a stored value |
//! | `record_miss` | A read found it dormant or still warming |
//! | `record_compute` | A compute cycle stored a fresh value |
//! | `record_skipped` | A compute cycle found the lease held elsewhere |
//! | `record_dormant` | A compute cycle found liveness expired and ended the chain |
//! | `record_error` | Any operation failed |

use std::time::Duration;

/// Trait for reactive cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Reactive cache HIT: {} took {:?}", key, duration);
    }

    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Reactive cache MISS: {} took {:?}", key, duration);
    }

    fn record_compute(&self, key: &str, duration: Duration) {
        debug!("Reactive cache COMPUTE: {} took {:?}", key, duration);
    }

    fn record_skipped(&self, key: &str) {
        debug!("Reactive cache SKIPPED: {} (lease held)", key);
    }

    fn record_dormant(&self, key: &str) {
        debug!("Reactive cache DORMANT: {}", key);
    }

    fn record_error(&self, key: &str, error: &str) {
        warn!("Reactive cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_compute(&self, _key: &str, _duration: Duration) {}
    fn record_skipped(&self, _key: &str) {}
    fn record_dormant(&self, _key: &str) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Metrics that only log, using the trait's default methods.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}
