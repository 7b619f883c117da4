//! Resume worker — wakes suspended runs whose delay has elapsed.
//!
//! Delay nodes park runs in storage rather than in an in-process timer, so
//! something has to look at the clock. This worker ticks on an interval,
//! asks the run repository for due runs, and hands each to the executor.
//! Runs in a batch are resumed one after another; the next tick picks up
//! whatever did not fit in the batch.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::executor::RunResumer;
use crate::ports::RunRepository;

/// Default pause between due-run scans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default cap on runs resumed per tick.
pub const DEFAULT_BATCH_LIMIT: usize = 64;

/// Background task that resumes due runs.
pub struct ResumeWorker<R, E> {
    runs: R,
    executor: Arc<E>,
    poll_interval: Duration,
    batch_limit: usize,
}

impl<R, E> ResumeWorker<R, E>
where
    R: RunRepository + Send + Sync + 'static,
    E: RunResumer + 'static,
{
    /// Create a worker with default tick interval and batch size.
    pub fn new(runs: R, executor: Arc<E>) -> Self {
        Self {
            runs,
            executor,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }

    /// Replace the tick interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Replace the per-tick batch cap.
    #[must_use]
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit;
        self
    }

    /// Resume every run due right now. One failing resume is logged and
    /// does not stop the rest of the batch.
    pub async fn tick(&self) {
        let due = match self
            .runs
            .find_due(dripline_domain::time::now(), self.batch_limit)
            .await
        {
            Ok(due) => due,
            Err(err) => {
                tracing::error!(error = %err, "failed to scan for due runs");
                return;
            }
        };
        if due.is_empty() {
            return;
        }

        tracing::debug!(count = due.len(), "resuming due runs");
        for run in due {
            if let Err(err) = self.executor.resume(run.id).await {
                tracing::error!(run_id = %run.id, error = %err, "failed to resume run");
            }
        }
    }

    /// Spawn the tick loop as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }
}
