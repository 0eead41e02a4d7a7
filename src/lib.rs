// ============================================================================
// denormsync Library
// ============================================================================

//! Keeps denormalized copies of source document fields synchronized in
//! every target document that embeds them.
//!
//! # Examples
//!
//! ```
//! use denormsync::{DenormConfig, Denormalizer, InMemoryDocumentStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(InMemoryDocumentStore::new());
//! store.set("users/u1", json!({"firstname": "Jane"})).await?;
//! store
//!     .set("posts/p1", json!({"author": {"id": "u1", "firstname": "John"}}))
//!     .await?;
//!
//! let config = DenormConfig::new("users")
//!     .track_field("firstname")
//!     .target("posts", "author.id");
//! let denormalizer = Denormalizer::new(config, store.clone())?;
//!
//! let source = store.document("users/u1").await.unwrap();
//! assert_eq!(denormalizer.propagate(&source).await?, 1);
//!
//! let post = store.document("posts/p1").await.unwrap();
//! assert_eq!(post.get("author.firstname"), Some(&json!("Jane")));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod core;
pub mod dispatch;
pub mod engine;
pub mod events;
pub mod store;
pub mod transform;

// Re-export main types for convenience
pub use config::{BackfillRetryPolicy, DOC_ID_WILDCARD, DenormConfig};
pub use crate::core::{
    DenormError, DocumentChange, DocumentSnapshot, FieldAccessor, JsonMap, Result, StoreError,
    TargetQueryFailure, Value,
};
pub use dispatch::{
    BackfillTaskHandler, DispatchOutcome, InMemoryTaskQueue, LocalBackfillRunner, ProcessingState,
    ProcessingStateSink, RecordingStateSink, TaskQueue, on_update,
};
pub use engine::{
    BackfillCursor, BackfillProgress, ChangeSet, Denormalizer, FieldDiff, detect_changes,
    resolve_target_field_path,
};
pub use store::{
    BulkWriteReport, CollectionScope, DocumentStore, EqualityQuery, FieldUpdate,
    InMemoryDocumentStore,
};
pub use transform::{DenormalizeStrategy, HttpTransform, TransformInvoker};
