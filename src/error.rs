//! Error types for the reactive cache.

use std::fmt;

/// Result type for reactive cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the reactive cache.
///
/// All operations return `Result<T>` where `Result` is defined as `std::result::Result<T, Error>`.
/// Different error variants represent different failure modes:
#[derive(Debug, Clone)]
pub enum Error {
    /// Serialization failed when converting a value to stored bytes.
    SerializationError(String),

    /// Deserialization failed when converting stored bytes back to a value.
    ///
    /// This indicates corrupted or malformed data in the value store.
    /// The entry is overwritten by the next successful compute cycle.
    DeserializationError(String),

    /// Value store error (Redis, in-memory, etc).
    ///
    /// This indicates the store is unavailable or returned an error.
    /// Common causes:
    /// - Redis connection lost
    /// - Network timeout
    /// - Backend protocol error
    ///
    /// **Recovery:** Fatal for the current operation. Retry is left to the caller
    /// or to the job queue.
    BackendError(String),

    /// The lease manager failed to execute an acquire or release.
    ///
    /// A lease held by someone else is NOT an error; it is reported as
    /// "not acquired". This variant is only for managers that could not answer.
    LeaseError(String),

    /// Enqueueing a refresh job failed.
    QueueError(String),

    /// The subject's own computation failed.
    ///
    /// Raised from `ReactiveSubject::calculate`. By the time it reaches the caller
    /// of `compute_cycle` the next refresh has already been queued.
    ComputeError(String),

    /// Subject lookup failed while resolving a refresh job.
    RepositoryError(String),

    /// Configuration error.
    ///
    /// Common causes:
    /// - Zero lifetime, refresh interval or lease timeout
    /// - Invalid connection string
    /// - Unregistered subject type
    ConfigError(String),

    /// Computed value exceeds the configured size limit and was not stored.
    ValueTooLarge {
        /// Encoded size of the rejected value
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// Invalid cache entry: corrupted envelope or bad magic.
    ///
    /// Returned when:
    /// - Magic header is not `b"RXCH"`
    /// - Non-reactive-cache data is stored under a subject key
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and stored data.
    ///
    /// **Recovery:** The entry is replaced on the next compute cycle.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from stored entry)
        found: u32,
    },

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// Whether this error came from the value store or the lease manager being
    /// unreachable, as opposed to bad data or a failed computation.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Error::BackendError(_) | Error::LeaseError(_) | Error::QueueError(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::LeaseError(msg) => write!(f, "Lease error: {}", msg),
            Error::QueueError(msg) => write!(f, "Queue error: {}", msg),
            Error::ComputeError(msg) => write!(f, "Compute error: {}", msg),
            Error::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::ValueTooLarge { size, limit } => {
                write!(f, "Value too large: {} bytes exceeds limit of {}", size, limit)
            }
            Error::InvalidCacheEntry(msg) => {
                write!(f, "Invalid cache entry: {}", msg)
            }
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::QueueError(e.to_string())
        } else if e.is_syntax() || e.is_data() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<deadpool_redis::redis::RedisError> for Error {
    fn from(e: deadpool_redis::redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}
