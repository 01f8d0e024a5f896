//! Submits compute cycles for subjects to the job queue.

use crate::error::Result;
use crate::queue::{JobQueue, RefreshJob};
use crate::subject::ReactiveSubject;
use std::time::Duration;

#[derive(Clone)]
pub struct Scheduler<Q: JobQueue> {
    queue: Q,
}

impl<Q: JobQueue> Scheduler<Q> {
    pub fn new(queue: Q) -> Self {
        Scheduler { queue }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Queue a compute cycle to run as soon as a worker is free.
    pub async fn enqueue_now<S: ReactiveSubject>(&self, subject: &S) -> Result<()> {
        self.queue.enqueue(RefreshJob::for_subject(subject)).await
    }

    /// Queue a compute cycle to run after `delay`.
    pub async fn enqueue_after<S: ReactiveSubject>(
        &self,
        delay: Duration,
        subject: &S,
    ) -> Result<()> {
        self.queue
            .enqueue_delayed(RefreshJob::for_subject(subject), delay)
            .await
    }
}
