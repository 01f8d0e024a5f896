//! Refresh jobs and the job queue interface.
//!
//! A [`RefreshJob`] names a subject by type and id; it is the only message that
//! flows through the refresh chain. [`JobQueue`] is the narrow interface to the
//! external queue. [`ChannelQueue`] is an in-process implementation backed by a
//! tokio channel, drained by a [`WorkerPool`](crate::worker::WorkerPool).

use crate::error::{Error, Result};
use crate::subject::ReactiveSubject;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// One unit of work: run the compute cycle for this subject.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefreshJob {
    pub subject_type: String,
    pub subject_id: String,
}

impl RefreshJob {
    pub fn new(subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        RefreshJob {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
        }
    }

    pub fn for_subject<S: ReactiveSubject>(subject: &S) -> Self {
        RefreshJob::new(S::subject_type(), subject.subject_id())
    }

    /// JSON wire form, for queues that carry jobs out of process.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl fmt::Display for RefreshJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject_type, self.subject_id)
    }
}

/// Trait for job queue implementations.
///
/// Delivery is at-least-once: the refresh chain stays correct when a job runs
/// twice, because the lease serializes the duplicate.
pub trait JobQueue: Send + Sync + Clone + 'static {
    /// Submit a job for immediate execution.
    ///
    /// # Errors
    /// Returns `Err` if the queue rejected the job.
    fn enqueue(&self, job: RefreshJob) -> impl Future<Output = Result<()>> + Send;

    /// Submit a job to run after `delay`.
    ///
    /// # Errors
    /// Returns `Err` if the queue rejected the job.
    fn enqueue_delayed(
        &self,
        job: RefreshJob,
        delay: Duration,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// In-process job queue over an unbounded tokio channel.
///
/// Delayed jobs are held by a sleeping task and sent when their delay elapses.
/// A delayed job whose queue closed in the meantime is dropped.
#[derive(Clone)]
pub struct ChannelQueue {
    sender: mpsc::UnboundedSender<RefreshJob>,
}

/// Receiving half of a [`ChannelQueue`].
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<RefreshJob>,
}

impl ChannelQueue {
    pub fn new() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelQueue { sender }, JobReceiver { receiver })
    }

    fn send(&self, job: RefreshJob) -> Result<()> {
        self.sender
            .send(job)
            .map_err(|e| Error::QueueError(format!("job queue closed, dropped {}", e.0)))
    }
}

impl JobQueue for ChannelQueue {
    async fn enqueue(&self, job: RefreshJob) -> Result<()> {
        debug!("Enqueue {}", job);
        self.send(job)
    }

    async fn enqueue_delayed(&self, job: RefreshJob, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return self.enqueue(job).await;
        }
        if self.sender.is_closed() {
            return Err(Error::QueueError(format!(
                "job queue closed, dropped {}",
                job
            )));
        }

        debug!("Enqueue {} in {:?}", job, delay);
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = queue.send(job) {
                debug!("Delayed job not delivered: {}", e);
            }
        });
        Ok(())
    }
}

impl JobReceiver {
    /// Wait for the next job. `None` once every queue handle is gone.
    pub async fn recv(&mut self) -> Option<RefreshJob> {
        self.receiver.recv().await
    }

    /// Take a job if one is ready.
    pub fn try_recv(&mut self) -> Option<RefreshJob> {
        self.receiver.try_recv().ok()
    }
}
