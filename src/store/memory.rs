use super::{BulkWriteReport, CollectionScope, DocumentStore, EqualityQuery, FieldUpdate};
use crate::core::{
    DocumentSnapshot, JsonMap, StoreError, StoreResult, Value, document_id, get_path, set_path,
    values_equal,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process document store keyed by full document path.
///
/// Supports nested subcollections and collection-group queries. Query and
/// write failures can be injected to exercise error paths.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<String, JsonMap>>,
    failing_collections: RwLock<HashSet<String>>,
    fail_writes: AtomicBool,
    applied_updates: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces the document at `path`.
    pub async fn set(&self, path: &str, fields: Value) -> StoreResult<()> {
        document_id(path)?;
        let Value::Object(fields) = fields else {
            return Err(StoreError::Write {
                path: path.to_string(),
                reason: "document data must be an object".to_string(),
            });
        };
        self.documents.write().await.insert(path.to_string(), fields);
        Ok(())
    }

    /// Adds a document with a generated id under `collection_path`.
    pub async fn add(&self, collection_path: &str, fields: Value) -> StoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.set(&format!("{}/{}", collection_path, id), fields).await?;
        Ok(id)
    }

    pub async fn document(&self, path: &str) -> Option<DocumentSnapshot> {
        let documents = self.documents.read().await;
        let fields = documents.get(path)?;
        DocumentSnapshot::new(path, fields.clone()).ok()
    }

    pub async fn delete(&self, path: &str) -> bool {
        self.documents.write().await.remove(path).is_some()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Copy of every document, keyed by path.
    pub async fn dump(&self) -> BTreeMap<String, JsonMap> {
        self.documents.read().await.clone()
    }

    /// Loads documents from a fixture object.
    ///
    /// Keys are document paths mapped to their fields, or collection paths
    /// mapped to an array of documents stored under generated ids.
    pub async fn load_json(&self, fixture: Value) -> StoreResult<usize> {
        let Value::Object(entries) = fixture else {
            return Err(StoreError::InvalidPath(
                "fixture must map document paths to objects".to_string(),
            ));
        };
        let mut count = 0;
        for (path, value) in entries {
            match value {
                Value::Array(documents) => {
                    for fields in documents {
                        self.add(&path, fields).await?;
                        count += 1;
                    }
                }
                fields => {
                    self.set(&path, fields).await?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Makes every query touching `collection` fail, as a missing index would.
    pub async fn fail_queries_on(&self, collection: &str) {
        self.failing_collections
            .write()
            .await
            .insert(collection.to_string());
    }

    /// Makes the next bulk flushes fail as a whole.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of field updates applied since creation.
    pub fn applied_updates(&self) -> usize {
        self.applied_updates.load(Ordering::SeqCst)
    }

    fn matches_scope(path: &str, scope: &CollectionScope) -> bool {
        let segments: Vec<&str> = path.split('/').collect();
        match scope {
            CollectionScope::Root(name) => segments.len() == 2 && segments[0] == name.as_str(),
            CollectionScope::Group(name) => {
                segments.len() >= 2 && segments[segments.len() - 2] == name.as_str()
            }
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_root_collections(&self) -> StoreResult<Vec<String>> {
        let documents = self.documents.read().await;
        let roots: BTreeSet<&str> = documents
            .keys()
            .filter_map(|path| path.split('/').next())
            .collect();
        Ok(roots.into_iter().map(str::to_string).collect())
    }

    async fn query(&self, query: &EqualityQuery) -> StoreResult<Vec<DocumentSnapshot>> {
        if self
            .failing_collections
            .read()
            .await
            .contains(query.scope.name())
        {
            return Err(StoreError::MissingIndex {
                collection: query.scope.name().to_string(),
                field_path: query.field_path.clone(),
            });
        }

        let documents = self.documents.read().await;
        documents
            .iter()
            .filter(|(path, _)| Self::matches_scope(path, &query.scope))
            .filter(|(_, fields)| {
                get_path(fields, &query.field_path).is_some_and(|v| values_equal(v, &query.value))
            })
            .map(|(path, fields)| DocumentSnapshot::new(path.clone(), fields.clone()))
            .collect()
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<DocumentSnapshot>> {
        Ok(self.document(&format!("{}/{}", collection, id)).await)
    }

    async fn list_page(
        &self,
        collection: &str,
        start_after: Option<&DocumentSnapshot>,
        limit: usize,
    ) -> StoreResult<Vec<DocumentSnapshot>> {
        let scope = CollectionScope::Root(collection.to_string());
        let documents = self.documents.read().await;

        let mut page = documents
            .iter()
            .filter(|(path, _)| Self::matches_scope(path, &scope))
            .map(|(path, fields)| DocumentSnapshot::new(path.clone(), fields.clone()))
            .collect::<StoreResult<Vec<_>>>()?;

        page.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(cursor) = start_after {
            page.retain(|doc| doc.id > cursor.id);
        }
        page.truncate(limit);
        Ok(page)
    }

    async fn bulk_update(&self, updates: Vec<FieldUpdate>) -> StoreResult<BulkWriteReport> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("bulk writer closed".to_string()));
        }

        let mut documents = self.documents.write().await;
        let mut report = BulkWriteReport::default();
        for update in updates {
            match documents.get_mut(&update.document_path) {
                Some(fields) => {
                    set_path(fields, &update.field_path, update.value);
                    report.applied += 1;
                }
                None => report.failures.push((
                    update.document_path.clone(),
                    StoreError::NotFound(update.document_path),
                )),
            }
        }
        self.applied_updates
            .fetch_add(report.applied, Ordering::SeqCst);
        Ok(report)
    }
}
