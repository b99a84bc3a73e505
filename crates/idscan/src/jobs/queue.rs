//! Bounded background execution for submitted jobs.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Handle to one scheduled unit of work. Dropping it does not cancel the work.
#[derive(Debug)]
pub struct JobHandle {
    job_id: String,
    handle: JoinHandle<()>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the work to finish. Panics inside the work are already
    /// handled by the work itself, so a join error is only logged.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(job_id = %self.job_id, "Background task ended abnormally: {}", e);
        }
    }
}

/// Runs futures on the tokio runtime with at most `limit` in flight.
#[derive(Clone)]
pub struct TaskQueue {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl TaskQueue {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Schedules `work` and returns immediately. The work starts once a slot is free.
    pub fn enqueue<F>(&self, job_id: &str, work: F) -> JobHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        let id = job_id.to_string();
        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::error!(job_id = %id, "Task queue closed before job could start");
                    return;
                }
            };
            work.await;
        });

        JobHandle {
            job_id: job_id.to_string(),
            handle,
        }
    }
}
