//! Per-subject-type configuration.
//!
//! A [`ReactiveConfig`] is attached to a subject type through
//! [`ReactiveSubject::config`](crate::ReactiveSubject::config) and copied into
//! the controller when it is built. It never changes afterward.

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Default lease timeout: 2 minutes.
pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Default refresh interval: 1 minute.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default lifetime of the liveness marker: 10 minutes.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(10 * 60);

/// How the base cache key of a subject is built.
///
/// The parts are joined with `:` by [`CacheKeyBuilder`](crate::key::CacheKeyBuilder).
pub enum KeyTemplate<S> {
    /// `[subject_type, subject_id]`
    Default,

    /// A constant key shared by every instance of the subject type.
    Fixed(Vec<String>),

    /// Key parts computed from the subject instance.
    Derived(fn(&S) -> Vec<String>),
}

impl<S> Clone for KeyTemplate<S> {
    fn clone(&self) -> Self {
        match self {
            KeyTemplate::Default => KeyTemplate::Default,
            KeyTemplate::Fixed(parts) => KeyTemplate::Fixed(parts.clone()),
            KeyTemplate::Derived(f) => KeyTemplate::Derived(*f),
        }
    }
}

impl<S> fmt::Debug for KeyTemplate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyTemplate::Default => write!(f, "Default"),
            KeyTemplate::Fixed(parts) => f.debug_tuple("Fixed").field(parts).finish(),
            KeyTemplate::Derived(_) => write!(f, "Derived(<fn>)"),
        }
    }
}

/// Immutable configuration for one subject type.
///
/// # Example
///
/// ```
/// use reactive_cache::config::ReactiveConfig;
/// use std::time::Duration;
///
/// struct Dashboard;
///
/// let config: ReactiveConfig<Dashboard> = ReactiveConfig::default()
///     .with_refresh_interval(Duration::from_secs(30))
///     .with_lifetime(Duration::from_secs(300));
///
/// assert!(config.validate().is_ok());
/// ```
pub struct ReactiveConfig<S> {
    /// How to derive the base key.
    pub key_template: KeyTemplate<S>,

    /// Upper bound on how long one compute attempt holds the lease.
    pub lease_timeout: Duration,

    /// Delay between the end of one compute cycle and the next.
    pub refresh_interval: Duration,

    /// How long a subject stays alive after its last read.
    pub lifetime: Duration,

    /// Reject computed values whose encoded size exceeds this many bytes.
    pub max_value_bytes: Option<usize>,
}

impl<S> ReactiveConfig<S> {
    pub fn with_key_template(mut self, template: KeyTemplate<S>) -> Self {
        self.key_template = template;
        self
    }

    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_max_value_bytes(mut self, limit: usize) -> Self {
        self.max_value_bytes = Some(limit);
        self
    }

    /// Check that the configuration can drive a refresh chain.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for a zero duration, a zero size limit, or an
    /// empty fixed key.
    pub fn validate(&self) -> Result<()> {
        if self.lease_timeout.is_zero() {
            return Err(Error::ConfigError("lease_timeout must be non-zero".into()));
        }
        if self.refresh_interval.is_zero() {
            return Err(Error::ConfigError(
                "refresh_interval must be non-zero".into(),
            ));
        }
        if self.lifetime.is_zero() {
            return Err(Error::ConfigError("lifetime must be non-zero".into()));
        }
        if self.max_value_bytes == Some(0) {
            return Err(Error::ConfigError(
                "max_value_bytes must be non-zero when set".into(),
            ));
        }
        if let KeyTemplate::Fixed(parts) = &self.key_template {
            if parts.is_empty() {
                return Err(Error::ConfigError("fixed key template is empty".into()));
            }
        }
        Ok(())
    }
}

impl<S> Default for ReactiveConfig<S> {
    fn default() -> Self {
        ReactiveConfig {
            key_template: KeyTemplate::Default,
            lease_timeout: DEFAULT_LEASE_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            lifetime: DEFAULT_LIFETIME,
            max_value_bytes: None,
        }
    }
}

impl<S> Clone for ReactiveConfig<S> {
    fn clone(&self) -> Self {
        ReactiveConfig {
            key_template: self.key_template.clone(),
            lease_timeout: self.lease_timeout,
            refresh_interval: self.refresh_interval,
            lifetime: self.lifetime,
            max_value_bytes: self.max_value_bytes,
        }
    }
}

impl<S> fmt::Debug for ReactiveConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveConfig")
            .field("key_template", &self.key_template)
            .field("lease_timeout", &self.lease_timeout)
            .field("refresh_interval", &self.refresh_interval)
            .field("lifetime", &self.lifetime)
            .field("max_value_bytes", &self.max_value_bytes)
            .finish()
    }
}
