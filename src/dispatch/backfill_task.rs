use super::{ProcessingState, ProcessingStateSink, TaskQueue};
use crate::core::{DenormError, Result, Value};
use crate::engine::{BackfillCursor, Denormalizer};
use crate::events;
use std::sync::Arc;

/// State message reported when a resync fails; details go to the logs.
pub const BACKFILL_FAILED_MESSAGE: &str =
    "An unknown error occurred while resyncing all documents, please refer to the logs for more details";

/// What one dispatch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Backfill is disabled in configuration.
    Skipped,
    /// The next batch was enqueued with this cursor.
    Enqueued(BackfillCursor),
    /// The whole source collection has been processed.
    Completed { source_docs: u64, target_docs: u64 },
}

/// Runs one backfill batch per dispatch and either re-enqueues the next
/// cursor or reports the terminal state.
pub struct BackfillTaskHandler {
    denormalizer: Arc<Denormalizer>,
    queue: Arc<dyn TaskQueue>,
    runtime: Arc<dyn ProcessingStateSink>,
}

impl BackfillTaskHandler {
    pub fn new(
        denormalizer: Arc<Denormalizer>,
        queue: Arc<dyn TaskQueue>,
        runtime: Arc<dyn ProcessingStateSink>,
    ) -> Self {
        Self {
            denormalizer,
            queue,
            runtime,
        }
    }

    pub fn denormalizer(&self) -> &Arc<Denormalizer> {
        &self.denormalizer
    }

    pub async fn handle(&self, cursor: BackfillCursor) -> Result<DispatchOutcome> {
        let config = self.denormalizer.config();
        if !config.do_backfill {
            events::backfill_skipped(&config.source_collection_name);
            self.runtime
                .set_processing_state(
                    ProcessingState::ProcessingComplete,
                    "Resync all documents skipped",
                )
                .await?;
            return Ok(DispatchOutcome::Skipped);
        }

        match self.step(cursor).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => self.report_failure(err).await,
        }
    }

    /// Same as [`handle`](Self::handle) for a task payload as delivered by a
    /// queue, i.e. the cursor's JSON wire format.
    pub async fn handle_payload(&self, payload: Value) -> Result<DispatchOutcome> {
        match BackfillCursor::from_payload(payload) {
            Ok(cursor) => self.handle(cursor).await,
            Err(err) => self.report_failure(err).await,
        }
    }

    async fn report_failure(&self, err: DenormError) -> Result<DispatchOutcome> {
        events::backfill_failed(BACKFILL_FAILED_MESSAGE, &err.to_string());
        self.runtime
            .set_processing_state(ProcessingState::ProcessingFailed, BACKFILL_FAILED_MESSAGE)
            .await?;
        Err(err)
    }

    async fn step(&self, cursor: BackfillCursor) -> Result<DispatchOutcome> {
        let progress = self.denormalizer.run_backfill_batch(cursor).await?;
        let BackfillCursor {
            source_docs,
            target_docs,
            ..
        } = progress.cursor;

        if progress.done {
            events::backfill_completed(
                &self.denormalizer.config().source_collection_name,
                source_docs,
                target_docs,
            );
            self.runtime
                .set_processing_state(
                    ProcessingState::ProcessingComplete,
                    &format!(
                        "Resync all documents completed. {} target documents updated",
                        target_docs
                    ),
                )
                .await?;
            return Ok(DispatchOutcome::Completed {
                source_docs,
                target_docs,
            });
        }

        self.queue.enqueue(progress.cursor.clone()).await?;
        Ok(DispatchOutcome::Enqueued(progress.cursor))
    }
}
