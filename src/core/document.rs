use super::error::{StoreError, StoreResult};
use super::value::{JsonMap, Value, get_path};

/// Read access to document fields by dotted path.
pub trait FieldAccessor {
    fn field(&self, path: &str) -> Option<&Value>;
}

impl FieldAccessor for JsonMap {
    fn field(&self, path: &str) -> Option<&Value> {
        get_path(self, path)
    }
}

/// Point-in-time copy of one stored document.
///
/// `path` is the full slash-delimited location (`companies/c1/employees/e1`)
/// and `id` is its last segment.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub path: String,
    pub fields: JsonMap,
}

impl DocumentSnapshot {
    /// Builds a snapshot from a document path, validating its shape.
    pub fn new(path: impl Into<String>, fields: JsonMap) -> StoreResult<Self> {
        let path = path.into();
        let id = document_id(&path)?.to_string();
        Ok(Self { id, path, fields })
    }

    /// Name of the collection directly holding this document.
    pub fn collection_id(&self) -> &str {
        let mut segments = self.path.rsplit('/');
        segments.next();
        segments.next().unwrap_or_default()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.fields, path)
    }
}

impl FieldAccessor for DocumentSnapshot {
    fn field(&self, path: &str) -> Option<&Value> {
        self.get(path)
    }
}

/// Before/after pair delivered by an update trigger.
#[derive(Debug, Clone)]
pub struct DocumentChange {
    pub before: DocumentSnapshot,
    pub after: DocumentSnapshot,
}

impl DocumentChange {
    pub fn new(before: DocumentSnapshot, after: DocumentSnapshot) -> Self {
        Self { before, after }
    }
}

/// Returns the id segment of a document path.
///
/// Document paths alternate collection and document segments, so a valid
/// path has an even, non-zero number of non-empty segments.
pub fn document_id(path: &str) -> StoreResult<&str> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 2 || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments[segments.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_exposes_id_and_collection() {
        let Value::Object(fields) = json!({"name": "n"}) else {
            unreachable!()
        };
        let doc = DocumentSnapshot::new("companies/c1/employees/e1", fields).unwrap();
        assert_eq!(doc.id, "e1");
        assert_eq!(doc.collection_id(), "employees");
        assert_eq!(doc.get("name"), Some(&json!("n")));
    }

    #[test]
    fn malformed_paths_are_rejected() {
        for path in ["users", "users/u1/posts", "users//u1", ""] {
            assert!(document_id(path).is_err(), "{path} should be invalid");
        }
    }
}
