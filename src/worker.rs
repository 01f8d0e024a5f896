//! Background workers that run compute cycles for refresh jobs.
//!
//! A [`WorkerPool`] drains a [`JobReceiver`], routes each [`RefreshJob`] by its
//! subject type to a registered [`JobHandler`] and runs it on the tokio runtime
//! with bounded concurrency. [`SubjectRefresher`] is the handler that turns a
//! job back into a subject and runs [`ReactiveCache::compute_cycle`].
//!
//! ```ignore
//! let backend = InMemoryBackend::new();
//! let (queue, jobs) = ChannelQueue::new();
//! let cache = ReactiveCache::<Environment, _, _, _>::new(backend.clone(), backend, queue)?;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::from_env())
//!     .register_subject(cache.clone(), EnvironmentRepository::new(pg));
//! tokio::spawn(async move { pool.run(jobs).await });
//! ```

use crate::backend::CacheBackend;
use crate::controller::ReactiveCache;
use crate::error::{Error, Result};
use crate::lease::LeaseManager;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::queue::{JobQueue, JobReceiver, RefreshJob};
use crate::repository::SubjectRepository;
use crate::subject::ReactiveSubject;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default number of jobs run at once.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Environment variable overriding [`WorkerPoolConfig::concurrency`].
pub const WORKERS_ENV: &str = "REACTIVE_CACHE_WORKERS";

/// Handles one refresh job. Object safe so handlers for different subject
/// types can share one pool.
pub trait JobHandler: Send + Sync {
    fn handle<'a>(&'a self, job: &'a RefreshJob) -> BoxFuture<'a, Result<()>>;
}

/// Resolves a job into its subject and runs the compute cycle.
///
/// A job whose subject no longer exists is dropped: the refresh chain simply
/// ends there.
pub struct SubjectRefresher<S, R, B, L, Q>
where
    S: ReactiveSubject,
    R: SubjectRepository<S>,
    B: CacheBackend,
    L: LeaseManager,
    Q: JobQueue,
{
    cache: ReactiveCache<S, B, L, Q>,
    repository: R,
}

impl<S, R, B, L, Q> SubjectRefresher<S, R, B, L, Q>
where
    S: ReactiveSubject,
    R: SubjectRepository<S>,
    B: CacheBackend,
    L: LeaseManager,
    Q: JobQueue,
{
    pub fn new(cache: ReactiveCache<S, B, L, Q>, repository: R) -> Self {
        SubjectRefresher { cache, repository }
    }

    async fn refresh(&self, job: &RefreshJob) -> Result<()> {
        match self.repository.find_by_id(&job.subject_id).await? {
            Some(subject) => self.cache.compute_cycle(&subject).await,
            None => {
                debug!("Subject {} no longer exists, dropping job", job);
                Ok(())
            }
        }
    }
}

impl<S, R, B, L, Q> JobHandler for SubjectRefresher<S, R, B, L, Q>
where
    S: ReactiveSubject,
    R: SubjectRepository<S>,
    B: CacheBackend,
    L: LeaseManager,
    Q: JobQueue,
{
    fn handle<'a>(&'a self, job: &'a RefreshJob) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.refresh(job))
    }
}

#[derive(Clone, Debug)]
pub struct WorkerPoolConfig {
    /// Maximum number of jobs running at once.
    pub concurrency: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        WorkerPoolConfig {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl WorkerPoolConfig {
    /// Default configuration, with `REACTIVE_CACHE_WORKERS` applied if it holds
    /// a positive integer.
    pub fn from_env() -> Self {
        let concurrency = std::env::var(WORKERS_ENV)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CONCURRENCY);
        WorkerPoolConfig { concurrency }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Runs refresh jobs for every registered subject type.
pub struct WorkerPool {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    semaphore: Arc<Semaphore>,
    concurrency: u32,
    metrics: Arc<dyn CacheMetrics>,
}

impl WorkerPool {
    /// Create a pool running at most `config.concurrency` jobs at once.
    ///
    /// The limit is clamped to `1..=min(Semaphore::MAX_PERMITS, u32::MAX)` so
    /// shutdown can still reclaim every permit in one `acquire_many`.
    pub fn new(config: WorkerPoolConfig) -> Self {
        let max = Semaphore::MAX_PERMITS.min(u32::MAX as usize);
        if config.concurrency > max {
            warn!(
                "Worker concurrency {} exceeds the maximum, using {}",
                config.concurrency, max
            );
        }
        let permits = config.concurrency.clamp(1, max);
        WorkerPool {
            handlers: HashMap::new(),
            semaphore: Arc::new(Semaphore::new(permits)),
            concurrency: permits as u32,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency as usize
    }

    /// Set custom metrics handler for failed jobs.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Route jobs of `subject_type` to `handler`, replacing any previous one.
    pub fn register<H: JobHandler + 'static>(
        mut self,
        subject_type: impl Into<String>,
        handler: H,
    ) -> Self {
        let subject_type = subject_type.into();
        info!("Worker pool handles {}", subject_type);
        self.handlers.insert(subject_type, Arc::new(handler));
        self
    }

    /// Register a [`SubjectRefresher`] for `S`.
    pub fn register_subject<S, R, B, L, Q>(
        self,
        cache: ReactiveCache<S, B, L, Q>,
        repository: R,
    ) -> Self
    where
        S: ReactiveSubject,
        R: SubjectRepository<S>,
        B: CacheBackend,
        L: LeaseManager,
        Q: JobQueue,
    {
        self.register(S::subject_type(), SubjectRefresher::new(cache, repository))
    }

    pub fn handles(&self, subject_type: &str) -> bool {
        self.handlers.contains_key(subject_type)
    }

    /// Run one job inline on the current task.
    ///
    /// # Errors
    ///
    /// - `Error::ConfigError`: No handler registered for the job's subject type
    /// - Any error returned by the handler
    pub async fn dispatch(&self, job: &RefreshJob) -> Result<()> {
        let handler = self.handlers.get(&job.subject_type).ok_or_else(|| {
            Error::ConfigError(format!(
                "no handler registered for subject type {}",
                job.subject_type
            ))
        })?;
        handler.handle(job).await
    }

    /// Process jobs until every queue handle is dropped, then wait for the
    /// jobs still running.
    pub async fn run(&self, receiver: JobReceiver) {
        self.run_until(receiver, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but also stops taking new jobs once `shutdown`
    /// completes.
    pub async fn run_until<F>(&self, mut receiver: JobReceiver, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let job = tokio::select! {
                _ = &mut shutdown => {
                    info!("Worker pool shutting down");
                    break;
                }
                job = receiver.recv() => match job {
                    Some(job) => job,
                    None => {
                        debug!("Job queue closed");
                        break;
                    }
                },
            };

            let handler = match self.handlers.get(&job.subject_type) {
                Some(handler) => Arc::clone(handler),
                None => {
                    warn!("No handler registered for {}, dropping job", job);
                    continue;
                }
            };

            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let metrics = Arc::clone(&self.metrics);

            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = handler.handle(&job).await {
                    // Compute failures are rescheduled by the controller
                    if e.is_infrastructure() {
                        error!("Refresh job {} failed: {}", job, e);
                    } else {
                        warn!("Refresh job {} failed: {}", job, e);
                    }
                    metrics.record_error(&job.to_string(), &e.to_string());
                }
            });
        }

        // Every permit back means every spawned job finished
        if self.semaphore.acquire_many(self.concurrency).await.is_ok() {
            debug!("Worker pool drained");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::queue::ChannelQueue;
    use crate::repository::InMemoryRepository;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone)]
    struct Runner {
        id: u32,
    }

    impl ReactiveSubject for Runner {
        type Value = String;

        fn subject_type() -> &'static str {
            "runner"
        }

        fn subject_id(&self) -> String {
            self.id.to_string()
        }

        async fn calculate(&self) -> Result<Self::Value> {
            Ok(format!("runner-{}-online", self.id))
        }
    }

    struct Recording {
        seen: Arc<Mutex<Vec<RefreshJob>>>,
        fail: bool,
    }

    impl JobHandler for Recording {
        fn handle<'a>(&'a self, job: &'a RefreshJob) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(job.clone());
                if self.fail {
                    return Err(Error::ComputeError("boom".into()));
                }
                Ok(())
            })
        }
    }

    #[derive(Default)]
    struct ErrorCount(AtomicUsize);

    impl CacheMetrics for ErrorCount {
        fn record_error(&self, _key: &str, _error: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_config_defaults() {
        assert_eq!(WorkerPoolConfig::default().concurrency, 16);
        assert_eq!(
            WorkerPoolConfig::default().with_concurrency(4).concurrency,
            4
        );
    }

    #[tokio::test]
    async fn test_refresher_runs_compute_cycle() {
        let backend = InMemoryBackend::new();
        let (queue, mut jobs) = ChannelQueue::new();
        let cache = ReactiveCache::<Runner, _, _, _>::new(backend.clone(), backend.clone(), queue)
            .unwrap();
        let repository = InMemoryRepository::new();
        repository.insert(Runner { id: 1 });

        cache.read(&Runner { id: 1 }).await.unwrap();
        let job = jobs.try_recv().unwrap();

        let pool = WorkerPool::new(WorkerPoolConfig::default())
            .register_subject(cache.clone(), repository);
        pool.dispatch(&job).await.unwrap();

        assert_eq!(
            cache.read(&Runner { id: 1 }).await.unwrap(),
            Some("runner-1-online".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_subject_dropped() {
        let backend = InMemoryBackend::new();
        let (queue, _jobs) = ChannelQueue::new();
        let cache = ReactiveCache::<Runner, _, _, _>::new(backend.clone(), backend.clone(), queue)
            .unwrap();
        let pool = WorkerPool::new(WorkerPoolConfig::default())
            .register_subject(cache, InMemoryRepository::<Runner>::new());

        pool.dispatch(&RefreshJob::new("runner", "404")).await.unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_type() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        let result = pool.dispatch(&RefreshJob::new("ghost", "1")).await;
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_run_drains_queue() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let metrics = Arc::new(ErrorCount::default());
        let pool = WorkerPool::new(WorkerPoolConfig::default().with_concurrency(2))
            .with_metrics(metrics.clone())
            .register(
                "runner",
                Recording {
                    seen: seen.clone(),
                    fail: false,
                },
            )
            .register(
                "broken",
                Recording {
                    seen: seen.clone(),
                    fail: true,
                },
            );

        let (queue, receiver) = ChannelQueue::new();
        queue.enqueue(RefreshJob::new("runner", "1")).await.unwrap();
        queue.enqueue(RefreshJob::new("ghost", "1")).await.unwrap();
        queue.enqueue(RefreshJob::new("broken", "1")).await.unwrap();
        queue.enqueue(RefreshJob::new("runner", "2")).await.unwrap();
        drop(queue);

        pool.run(receiver).await;

        let mut handled: Vec<String> = seen.lock().unwrap().iter().map(|j| j.to_string()).collect();
        handled.sort();
        assert_eq!(handled, vec!["broken/1", "runner/1", "runner/2"]);
        assert_eq!(metrics.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrency_is_clamped() {
        let pool = WorkerPool::new(WorkerPoolConfig::default().with_concurrency(0));
        assert_eq!(pool.concurrency(), 1);

        let pool = WorkerPool::new(WorkerPoolConfig::default().with_concurrency(usize::MAX));
        assert_eq!(
            pool.concurrency(),
            Semaphore::MAX_PERMITS.min(u32::MAX as usize)
        );
    }

    #[tokio::test]
    async fn test_run_waits_for_jobs_at_max_concurrency() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pool = WorkerPool::new(WorkerPoolConfig::default().with_concurrency(usize::MAX))
            .register(
                "runner",
                Recording {
                    seen: seen.clone(),
                    fail: false,
                },
            );

        let (queue, receiver) = ChannelQueue::new();
        for id in 0..8 {
            queue
                .enqueue(RefreshJob::new("runner", id.to_string()))
                .await
                .unwrap();
        }
        drop(queue);

        pool.run(receiver).await;
        assert_eq!(seen.lock().unwrap().len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pool = WorkerPool::new(WorkerPoolConfig::default()).register(
            "runner",
            Recording {
                seen: seen.clone(),
                fail: false,
            },
        );

        let (queue, receiver) = ChannelQueue::new();
        queue.enqueue(RefreshJob::new("runner", "1")).await.unwrap();

        // The queue handle stays alive; only the shutdown signal ends the loop
        pool.run_until(receiver, tokio::time::sleep(Duration::from_secs(1)))
            .await;

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(queue.enqueue(RefreshJob::new("runner", "2")).await.is_err());
    }
}
