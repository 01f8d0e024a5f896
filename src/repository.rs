//! Subject repository trait for turning refresh jobs back into subjects.
//!
//! A [`RefreshJob`](crate::queue::RefreshJob) only carries a subject id. Before a
//! worker can run a compute cycle it needs the subject itself, which lives in
//! whatever primary data source the application uses.
//!
//! # Implementing SubjectRepository
//!
//! Implement this trait for any storage backend:
//! - SQL databases: SQLx, tokio-postgres, Diesel
//! - NoSQL: MongoDB, DynamoDB
//! - In-memory: For testing (provided in this module)
//!
//! ```ignore
//! use reactive_cache::repository::SubjectRepository;
//!
//! struct EnvironmentRepository {
//!     pool: sqlx::PgPool,
//! }
//!
//! impl SubjectRepository<Environment> for EnvironmentRepository {
//!     async fn find_by_id(&self, id: &str) -> Result<Option<Environment>> {
//!         let id: i64 = id.parse().map_err(|_| Error::RepositoryError(id.to_string()))?;
//!         sqlx::query_as("SELECT id, name FROM environments WHERE id = $1")
//!             .bind(id)
//!             .fetch_optional(&self.pool)
//!             .await
//!             .map_err(|e| Error::RepositoryError(e.to_string()))
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! Return `Ok(None)` when the subject no longer exists: the worker drops the job
//! and the refresh chain ends. Return `Err` for connectivity issues, query
//! timeouts and the like.

use crate::error::Result;
use crate::subject::ReactiveSubject;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

/// Trait for subject repository implementations.
pub trait SubjectRepository<S: ReactiveSubject>: Send + Sync + 'static {
    /// Fetch a subject by id from the primary data source.
    ///
    /// # Returns
    /// - `Ok(Some(subject))` - Subject found
    /// - `Ok(None)` - Subject not found (not an error)
    /// - `Err(e)` - Data source error
    ///
    /// # Errors
    /// Returns `Err` if data source is unavailable or fetch fails
    fn find_by_id(&self, id: &str) -> impl Future<Output = Result<Option<S>>> + Send;
}

/// Simple in-memory repository, keyed by `subject_id()`.
///
/// Cloning shares the underlying map, so a test can keep one handle to mutate
/// while a worker pool holds another.
pub struct InMemoryRepository<S> {
    data: Arc<DashMap<String, S>>,
}

impl<S: ReactiveSubject + Clone> InMemoryRepository<S> {
    pub fn new() -> Self {
        InMemoryRepository {
            data: Arc::new(DashMap::new()),
        }
    }

    /// Insert or replace a subject under its own id.
    pub fn insert(&self, subject: S) {
        self.data.insert(subject.subject_id(), subject);
    }

    pub fn remove(&self, id: &str) -> Option<S> {
        self.data.remove(id).map(|(_, subject)| subject)
    }

    pub fn clear(&self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<S> Clone for InMemoryRepository<S> {
    fn clone(&self) -> Self {
        InMemoryRepository {
            data: Arc::clone(&self.data),
        }
    }
}

impl<S: ReactiveSubject + Clone> Default for InMemoryRepository<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ReactiveSubject + Clone> SubjectRepository<S> for InMemoryRepository<S> {
    async fn find_by_id(&self, id: &str) -> Result<Option<S>> {
        Ok(self.data.get(id).map(|entry| entry.value().clone()))
    }
}
