use crate::core::{DocumentSnapshot, JsonMap, Value, is_truthy};

/// Computes the next embedded object from the previous one.
///
/// Each key of `previous` keeps its value unless the source currently holds a
/// truthy value under the same key. The link field (the template's leaf, or
/// any key whose previous value is the source id) is re-anchored to the
/// source id. Keys the target owns are never dropped and source fields the
/// embedded object never had are never added.
pub fn merge_embedded(previous: &JsonMap, source: &DocumentSnapshot, link_field: &str) -> JsonMap {
    let source_id = Value::String(source.id.clone());

    let mut next: JsonMap = previous
        .iter()
        .map(|(key, prev_value)| {
            if key == link_field || *prev_value == source_id {
                return (key.clone(), source_id.clone());
            }
            let value = match source.get(key) {
                Some(current) if is_truthy(current) => current.clone(),
                _ => prev_value.clone(),
            };
            (key.clone(), value)
        })
        .collect();

    next.insert(link_field.to_string(), source_id);
    next
}

/// Shapes a transform result into the embedded object, adding the link field
/// when the transform left it out.
pub fn anchor_transformed(payload: &JsonMap, source_id: &str, link_field: &str) -> JsonMap {
    let mut next = payload.clone();
    if !next.contains_key(link_field) {
        next.insert(link_field.to_string(), Value::String(source_id.to_string()));
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn source(fields: Value) -> DocumentSnapshot {
        DocumentSnapshot::new("users/X", object(fields)).unwrap()
    }

    #[test]
    fn changed_field_is_copied_and_extra_fields_survive() {
        let previous = object(json!({"id": "X", "firstname": "John", "lastname": "Doe", "extra": true}));
        let after = source(json!({"firstname": "Jane", "lastname": "Doe", "age": 40}));

        let next = merge_embedded(&previous, &after, "id");

        assert_eq!(
            Value::Object(next),
            json!({"id": "X", "firstname": "Jane", "lastname": "Doe", "extra": true})
        );
    }

    #[test]
    fn falsy_or_absent_source_values_keep_previous() {
        let previous = object(json!({"id": "X", "firstname": "John", "nickname": "JJ", "score": 3}));
        let after = source(json!({"firstname": null, "score": 0}));

        let next = merge_embedded(&previous, &after, "id");

        assert_eq!(
            Value::Object(next),
            json!({"id": "X", "firstname": "John", "nickname": "JJ", "score": 3})
        );
    }

    #[test]
    fn link_field_is_reanchored() {
        let previous = object(json!({"uid": "stale", "ref": "X", "name": "old"}));
        let after = source(json!({"uid": "other", "ref": "changed", "name": "new"}));

        let next = merge_embedded(&previous, &after, "uid");

        assert_eq!(next.get("uid"), Some(&json!("X")));
        assert_eq!(next.get("ref"), Some(&json!("X")));
        assert_eq!(next.get("name"), Some(&json!("new")));
    }

    #[test]
    fn merge_is_idempotent() {
        let previous = object(json!({"id": "X", "firstname": "John", "extra": 1}));
        let after = source(json!({"firstname": "Jane"}));

        let once = merge_embedded(&previous, &after, "id");
        let twice = merge_embedded(&once, &after, "id");
        assert_eq!(once, twice);
    }

    #[test]
    fn transformed_payload_gets_link_field_when_missing() {
        let payload = object(json!({"firstname": "Jane", "lastname": "Doe", "customData": true}));
        let next = anchor_transformed(&payload, "X", "id");
        assert_eq!(
            Value::Object(next),
            json!({"firstname": "Jane", "lastname": "Doe", "customData": true, "id": "X"})
        );

        let payload = object(json!({"id": "kept"}));
        assert_eq!(anchor_transformed(&payload, "X", "id").get("id"), Some(&json!("kept")));
    }
}
