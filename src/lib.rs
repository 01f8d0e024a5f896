//! # reactive-cache
//!
//! A cache that keeps an expensive value fresh in the background for exactly as
//! long as someone keeps reading it.
//!
//! ## Features
//!
//! - **Read-driven:** Every read extends the subject's liveness and queues a
//!   recompute; once reads stop, the refresh chain ends on its own
//! - **Single-flight:** A per-subject lease guarantees at most one computation at
//!   a time across every process sharing the store
//! - **Never blocks on compute:** Reads return whatever is stored, or nothing
//!   while the first value is still being computed
//! - **Backend Agnostic:** In-memory and Redis value stores, or your own
//! - **Production Ready:** Built-in logging, metrics hooks, and error handling
//!
//! ## Quick Start
//!
//! ```ignore
//! use reactive_cache::{
//!     ChannelQueue, InMemoryBackend, InMemoryRepository, ReactiveCache, ReactiveSubject,
//!     Result, WorkerPool, WorkerPoolConfig,
//! };
//!
//! // 1. Describe the subject and how to compute its value
//! #[derive(Clone)]
//! struct Environment {
//!     id: u64,
//! }
//!
//! impl ReactiveSubject for Environment {
//!     type Value = Vec<String>;
//!     fn subject_type() -> &'static str { "environment" }
//!     fn subject_id(&self) -> String { self.id.to_string() }
//!     async fn calculate(&self) -> Result<Self::Value> {
//!         fetch_pods_from_kubernetes(self.id).await
//!     }
//! }
//!
//! // 2. Wire store, lease manager and queue
//! let backend = InMemoryBackend::new();
//! let (queue, jobs) = ChannelQueue::new();
//! let cache = ReactiveCache::<Environment, _, _, _>::new(backend.clone(), backend, queue)?;
//!
//! // 3. Run workers that resolve jobs back into subjects
//! let pool = WorkerPool::new(WorkerPoolConfig::from_env())
//!     .register_subject(cache.clone(), environments);
//! tokio::spawn(async move { pool.run(jobs).await });
//!
//! // 4. Read. `None` until the first value is computed, then kept fresh.
//! let pods = cache.read_with_trigger(&environment, |pods| pods.len()).await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod key;
pub mod lease;
pub mod liveness;
pub mod observability;
pub mod queue;
pub mod repository;
pub mod scheduler;
pub mod serialization;
pub mod state;
pub mod subject;
pub mod worker;

// Re-exports for convenience
pub use backend::{CacheBackend, InMemoryBackend};
pub use config::{KeyTemplate, ReactiveConfig};
pub use controller::ReactiveCache;
pub use error::{Error, Result};
pub use lease::{LeaseGuard, LeaseManager, LeaseToken};
pub use queue::{ChannelQueue, JobQueue, JobReceiver, RefreshJob};
pub use repository::{InMemoryRepository, SubjectRepository};
pub use state::SubjectState;
pub use subject::ReactiveSubject;
pub use worker::{JobHandler, SubjectRefresher, WorkerPool, WorkerPoolConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
