//! Core subject trait that every reactively cached entity implements.

use crate::config::ReactiveConfig;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

/// An entity whose expensive value is kept fresh while it is being read.
///
/// # Example
///
/// ```
/// use reactive_cache::{ReactiveSubject, Result};
/// use reactive_cache::config::ReactiveConfig;
/// use std::time::Duration;
///
/// pub struct Environment {
///     pub id: u64,
/// }
///
/// impl ReactiveSubject for Environment {
///     type Value = Vec<String>;
///
///     fn subject_type() -> &'static str {
///         "environment"
///     }
///
///     fn subject_id(&self) -> String {
///         self.id.to_string()
///     }
///
///     fn config() -> ReactiveConfig<Self> {
///         ReactiveConfig::default().with_refresh_interval(Duration::from_secs(30))
///     }
///
///     async fn calculate(&self) -> Result<Self::Value> {
///         Ok(vec!["pod-a".to_string(), "pod-b".to_string()])
///     }
/// }
/// ```
pub trait ReactiveSubject: Send + Sync + Sized + 'static {
    /// The value computed for this subject and stored in the value store.
    type Value: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Name of the subject type.
    ///
    /// Used as the first key part by `KeyTemplate::Default` and to route refresh
    /// jobs back to the right worker handler.
    fn subject_type() -> &'static str;

    /// Stable identifier of this subject, unique within its type.
    fn subject_id(&self) -> String;

    /// Configuration shared by every instance of this subject type.
    fn config() -> ReactiveConfig<Self> {
        ReactiveConfig::default()
    }

    /// Compute the value. Runs in the background while holding the lease.
    ///
    /// # Errors
    ///
    /// Any error is propagated to the worker after the next refresh has been
    /// queued. Use `Error::ComputeError` for failures of the computation itself.
    fn calculate(&self) -> impl Future<Output = Result<Self::Value>> + Send;

    /// Called after a compute cycle stored a value that differs from the
    /// previously stored one.
    fn on_value_updated(&self, _value: &Self::Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Cluster {
        id: u32,
    }

    impl ReactiveSubject for Cluster {
        type Value = u32;

        fn subject_type() -> &'static str {
            "cluster"
        }

        fn subject_id(&self) -> String {
            self.id.to_string()
        }

        fn config() -> ReactiveConfig<Self> {
            ReactiveConfig::default().with_lifetime(Duration::from_secs(60))
        }

        async fn calculate(&self) -> Result<Self::Value> {
            Ok(self.id * 2)
        }
    }

    #[tokio::test]
    async fn test_calculate() {
        let cluster = Cluster { id: 21 };
        assert_eq!(cluster.calculate().await.unwrap(), 42);
    }

    #[test]
    fn test_identity_and_config() {
        let cluster = Cluster { id: 7 };
        assert_eq!(Cluster::subject_type(), "cluster");
        assert_eq!(cluster.subject_id(), "7");
        assert_eq!(Cluster::config().lifetime, Duration::from_secs(60));
    }
}
