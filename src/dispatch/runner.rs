use super::{BackfillTaskHandler, DispatchOutcome, InMemoryTaskQueue, ProcessingStateSink, TaskQueue};
use crate::config::BackfillRetryPolicy;
use crate::core::{DenormError, Result};
use crate::engine::{BackfillCursor, Denormalizer};
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing::{Level, event};

/// Drives a backfill to completion inside the current process.
///
/// Plays the part of a retrying task queue: each queued cursor is one
/// dispatch, and a failing dispatch is retried with exponential backoff up to
/// the configured number of attempts.
pub struct LocalBackfillRunner {
    handler: BackfillTaskHandler,
    queue: Arc<InMemoryTaskQueue>,
    policy: BackfillRetryPolicy,
}

impl LocalBackfillRunner {
    pub fn new(denormalizer: Arc<Denormalizer>, runtime: Arc<dyn ProcessingStateSink>) -> Self {
        let policy = denormalizer.config().retry.clone();
        let queue = Arc::new(InMemoryTaskQueue::new());
        let handler = BackfillTaskHandler::new(denormalizer, queue.clone(), runtime);
        Self {
            handler,
            queue,
            policy,
        }
    }

    pub fn queue(&self) -> &Arc<InMemoryTaskQueue> {
        &self.queue
    }

    /// Enqueues `initial` and dispatches until the queue is drained.
    ///
    /// Returns the outcome of the last dispatch.
    pub async fn run(&self, initial: BackfillCursor) -> Result<DispatchOutcome> {
        self.queue.enqueue(initial).await?;

        let mut last = None;
        let mut dispatches = 0u64;
        while let Some(cursor) = self.queue.pop().await {
            dispatches += 1;
            last = Some(self.dispatch_with_retry(cursor).await?);
        }

        event!(Level::DEBUG, dispatches, "backfill queue drained");
        last.ok_or_else(|| DenormError::Dispatch("backfill queue drained without a dispatch".into()))
    }

    async fn dispatch_with_retry(&self, cursor: BackfillCursor) -> Result<DispatchOutcome> {
        let mut attempt = 1;
        loop {
            match self.handler.handle(cursor.clone()).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay_ms = self.policy.backoff_ms(attempt);
                    event!(
                        Level::WARN,
                        attempt,
                        delay_ms,
                        error = %err,
                        "backfill dispatch failed, retrying"
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
