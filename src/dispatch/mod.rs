//! Adapters between the engine and the hosting runtime.
//!
//! - `trigger.rs` - update-trigger entry point
//! - `backfill_task.rs` - one task-queue dispatch = one backfill batch
//! - `runner.rs` - in-process queue draining with bounded retries
//!
//! The hosting runtime is reached through two seams: [`TaskQueue`] to
//! re-enqueue the next batch and [`ProcessingStateSink`] to report the
//! terminal state of a resync.

mod backfill_task;
mod runner;
mod trigger;

use crate::core::Result;
use crate::engine::BackfillCursor;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

pub use backfill_task::{BACKFILL_FAILED_MESSAGE, BackfillTaskHandler, DispatchOutcome};
pub use runner::LocalBackfillRunner;
pub use trigger::on_update;

/// Terminal state of a resync reported to the hosting runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    ProcessingComplete,
    ProcessingFailed,
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, cursor: BackfillCursor) -> Result<()>;
}

#[async_trait]
pub trait ProcessingStateSink: Send + Sync {
    async fn set_processing_state(&self, state: ProcessingState, message: &str) -> Result<()>;
}

/// FIFO task queue kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryTaskQueue {
    tasks: Mutex<VecDeque<BackfillCursor>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pop(&self) -> Option<BackfillCursor> {
        self.tasks.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, cursor: BackfillCursor) -> Result<()> {
        self.tasks.lock().await.push_back(cursor);
        Ok(())
    }
}

/// Keeps every reported state, most recent last.
#[derive(Debug, Default)]
pub struct RecordingStateSink {
    states: Mutex<Vec<(ProcessingState, String)>>,
}

impl RecordingStateSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn states(&self) -> Vec<(ProcessingState, String)> {
        self.states.lock().await.clone()
    }

    pub async fn last(&self) -> Option<(ProcessingState, String)> {
        self.states.lock().await.last().cloned()
    }
}

#[async_trait]
impl ProcessingStateSink for RecordingStateSink {
    async fn set_processing_state(&self, state: ProcessingState, message: &str) -> Result<()> {
        self.states.lock().await.push((state, message.to_string()));
        Ok(())
    }
}
