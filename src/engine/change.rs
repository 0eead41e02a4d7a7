use crate::core::{FieldAccessor, Value, fields_equal};
use crate::events;
use serde::Serialize;
use std::collections::BTreeMap;

/// Before/after values of one tracked field. `None` means the field is absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Outcome of comparing two versions of a source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub diffs: BTreeMap<String, FieldDiff>,
}

impl ChangeSet {
    pub fn any_changed(&self) -> bool {
        !self.diffs.is_empty()
    }
}

/// Compares every tracked path of `before` and `after` by deep equality.
///
/// Emits a `source document field changed` event when at least one path
/// differs; nothing is emitted otherwise.
pub fn detect_changes<B, A>(before: &B, after: &A, tracked_paths: &[String]) -> ChangeSet
where
    B: FieldAccessor + ?Sized,
    A: FieldAccessor + ?Sized,
{
    let mut diffs = BTreeMap::new();
    for path in tracked_paths {
        let old = before.field(path);
        let new = after.field(path);
        if !fields_equal(old, new) {
            diffs.insert(
                path.clone(),
                FieldDiff {
                    before: old.cloned(),
                    after: new.cloned(),
                },
            );
        }
    }

    let changes = ChangeSet { diffs };
    if changes.any_changed() {
        events::source_document_field_changed(&changes.diffs);
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JsonMap;
    use serde_json::json;
    use tracing_test::traced_test;

    fn fields(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn tracked(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    #[traced_test]
    fn unchanged_fields_report_nothing() {
        let before = fields(json!({"firstname": "John", "lastname": "Doe", "age": 30}));
        let after = fields(json!({"firstname": "John", "lastname": "Doe", "age": 31}));

        let changes = detect_changes(&before, &after, &tracked(&["firstname", "lastname"]));

        assert!(!changes.any_changed());
        assert!(!logs_contain("source document field changed"));
    }

    #[test]
    #[traced_test]
    fn single_changed_path_is_reported() {
        let before = fields(json!({"firstname": "John", "lastname": "Doe"}));
        let after = fields(json!({"firstname": "John", "lastname": "Smith"}));

        let changes = detect_changes(&before, &after, &tracked(&["firstname", "lastname"]));

        assert!(changes.any_changed());
        assert_eq!(changes.diffs.len(), 1);
        assert_eq!(
            changes.diffs.get("lastname"),
            Some(&FieldDiff {
                before: Some(json!("Doe")),
                after: Some(json!("Smith")),
            })
        );
        assert!(logs_contain("source document field changed"));
    }

    #[test]
    fn nested_values_compare_by_content() {
        let before = fields(json!({"details": {"mobile": "1", "tags": ["a", "b"]}}));
        let same = fields(json!({"details": {"tags": ["a", "b"], "mobile": "1"}}));
        let moved = fields(json!({"details": {"mobile": "1", "tags": ["b", "a"]}}));

        assert!(!detect_changes(&before, &same, &tracked(&["details"])).any_changed());
        assert!(detect_changes(&before, &moved, &tracked(&["details"])).any_changed());
        assert!(!detect_changes(&before, &moved, &tracked(&["details.mobile"])).any_changed());
    }

    #[test]
    fn removed_field_counts_as_change() {
        let before = fields(json!({"firstname": "John"}));
        let after = fields(json!({}));

        let changes = detect_changes(&before, &after, &tracked(&["firstname"]));
        assert_eq!(
            changes.diffs.get("firstname"),
            Some(&FieldDiff {
                before: Some(json!("John")),
                after: None,
            })
        );
    }
}
