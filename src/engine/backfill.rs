use super::Denormalizer;
use crate::core::{Result, Value};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, Level, event, info_span};

/// Resumable position of a backfill, threaded through successive batches.
///
/// Serialized as `{"startAfterDocId"?, "sourceDocs", "targetDocs"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillCursor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_after_doc_id: Option<String>,
    #[serde(default)]
    pub source_docs: u64,
    #[serde(default)]
    pub target_docs: u64,
}

impl BackfillCursor {
    /// Parses a task payload; an absent or `null` payload starts a new scan.
    pub fn from_payload(payload: Value) -> Result<Self> {
        if payload.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(payload)?)
    }
}

/// Cursor returned by one batch; `done` once a page comes back empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillProgress {
    pub done: bool,
    #[serde(flatten)]
    pub cursor: BackfillCursor,
}

impl Denormalizer {
    /// Propagates one page of source documents.
    ///
    /// Documents are read in id order, strictly after
    /// `cursor.start_after_doc_id`. When that document no longer exists the
    /// scan restarts from the beginning of the collection, which is safe
    /// because propagation is idempotent.
    pub async fn run_backfill_batch(&self, cursor: BackfillCursor) -> Result<BackfillProgress> {
        let span = info_span!(
            "denormsync.backfill_batch",
            source_collection = %self.config.source_collection_name,
            start_after = cursor.start_after_doc_id.as_deref().unwrap_or_default()
        );
        self.backfill_page(cursor).instrument(span).await
    }

    async fn backfill_page(&self, cursor: BackfillCursor) -> Result<BackfillProgress> {
        let collection = &self.config.source_collection_name;

        let start_after = match cursor.start_after_doc_id.as_deref() {
            Some(id) => self.store.get_document(collection, id).await?,
            None => None,
        };
        if cursor.start_after_doc_id.is_some() && start_after.is_none() {
            event!(Level::WARN, "backfill cursor document missing, restarting scan");
        }

        let page = self
            .store
            .list_page(collection, start_after.as_ref(), self.config.batch_update_limit)
            .await?;

        let Some(last) = page.last() else {
            return Ok(BackfillProgress {
                done: true,
                cursor: BackfillCursor {
                    start_after_doc_id: None,
                    ..cursor
                },
            });
        };

        let updated = try_join_all(page.iter().map(|doc| self.propagate(doc))).await?;
        let target_docs: usize = updated.iter().sum();

        event!(
            Level::DEBUG,
            page_size = page.len(),
            target_docs,
            "backfill batch propagated"
        );

        Ok(BackfillProgress {
            done: false,
            cursor: BackfillCursor {
                start_after_doc_id: Some(last.id.clone()),
                source_docs: cursor.source_docs + page.len() as u64,
                target_docs: cursor.target_docs + target_docs as u64,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DenormError;
    use serde_json::json;

    #[test]
    fn malformed_payload_is_a_json_error() {
        assert_eq!(
            BackfillCursor::from_payload(Value::Null).unwrap(),
            BackfillCursor::default()
        );

        let err = BackfillCursor::from_payload(json!({"sourceDocs": "ten"})).unwrap_err();
        assert!(matches!(err, DenormError::Json(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn cursor_wire_format_is_camel_case() {
        let cursor: BackfillCursor = serde_json::from_value(json!({"startAfterDocId": "u9"})).unwrap();
        assert_eq!(
            cursor,
            BackfillCursor {
                start_after_doc_id: Some("u9".into()),
                source_docs: 0,
                target_docs: 0,
            }
        );

        let progress = BackfillProgress {
            done: true,
            cursor: BackfillCursor {
                start_after_doc_id: None,
                source_docs: 11,
                target_docs: 4,
            },
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({"done": true, "sourceDocs": 11, "targetDocs": 4})
        );
    }
}
