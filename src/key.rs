//! Cache key resolution.

use crate::config::{KeyTemplate, ReactiveConfig};
use crate::subject::ReactiveSubject;

/// Separator between key parts.
pub const KEY_SEPARATOR: &str = ":";

/// Qualifier appended to the base key for the liveness marker.
pub const ALIVE_QUALIFIER: &str = "alive";

/// Builder for cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Resolve the key for a subject plus optional qualifiers.
    ///
    /// The template is evaluated first (calling it with the subject when it is
    /// `Derived`), then the qualifiers are appended and everything is joined.
    pub fn resolve<S: ReactiveSubject>(
        subject: &S,
        template: &KeyTemplate<S>,
        qualifiers: &[&str],
    ) -> String {
        let mut parts = match template {
            KeyTemplate::Default => vec![S::subject_type().to_string(), subject.subject_id()],
            KeyTemplate::Fixed(parts) => parts.clone(),
            KeyTemplate::Derived(f) => f(subject),
        };
        parts.extend(qualifiers.iter().map(|q| q.to_string()));
        parts.join(KEY_SEPARATOR)
    }

    /// Key of the stored value.
    pub fn base_key<S: ReactiveSubject>(subject: &S, config: &ReactiveConfig<S>) -> String {
        Self::resolve(subject, &config.key_template, &[])
    }

    /// Key of the liveness marker: `base:alive`.
    pub fn alive_key<S: ReactiveSubject>(subject: &S, config: &ReactiveConfig<S>) -> String {
        Self::resolve(subject, &config.key_template, &[ALIVE_QUALIFIER])
    }
}
