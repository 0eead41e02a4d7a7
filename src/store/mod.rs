//! Document store interface consumed by the engine.
//!
//! - `DocumentStore` - what the engine needs from a store: root collection
//!   listing, equality queries (root or collection group), paged scans and
//!   bulk field-level updates
//! - `memory.rs` - `InMemoryDocumentStore`, a complete in-process store

mod memory;

use crate::core::{DocumentSnapshot, StoreError, StoreResult, Value};
use async_trait::async_trait;

pub use memory::InMemoryDocumentStore;

/// Where an equality query looks for documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionScope {
    /// The root-level collection with this name.
    Root(String),
    /// Every collection with this name, at any depth.
    Group(String),
}

impl CollectionScope {
    pub fn name(&self) -> &str {
        match self {
            Self::Root(name) | Self::Group(name) => name,
        }
    }
}

/// `field_path == value` over one collection scope.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualityQuery {
    pub scope: CollectionScope,
    pub field_path: String,
    pub value: Value,
}

/// Field-level update of one document; only `field_path` is replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub document_path: String,
    pub field_path: String,
    pub value: Value,
}

/// Result of a bulk flush. Each update is atomic on its own; failures of
/// individual documents do not roll back the others.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteReport {
    pub applied: usize,
    pub failures: Vec<(String, StoreError)>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Names of the root-level collections.
    async fn list_root_collections(&self) -> StoreResult<Vec<String>>;

    async fn query(&self, query: &EqualityQuery) -> StoreResult<Vec<DocumentSnapshot>>;

    async fn get_document(&self, collection: &str, id: &str)
    -> StoreResult<Option<DocumentSnapshot>>;

    /// Documents of a root collection ordered by id, strictly after
    /// `start_after` when given.
    async fn list_page(
        &self,
        collection: &str,
        start_after: Option<&DocumentSnapshot>,
        limit: usize,
    ) -> StoreResult<Vec<DocumentSnapshot>>;

    /// Applies every update, returning once all of them have settled.
    async fn bulk_update(&self, updates: Vec<FieldUpdate>) -> StoreResult<BulkWriteReport>;
}
