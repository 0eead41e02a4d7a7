//! Dynamic document values.
//!
//! Documents have no fixed schema, so fields are kept as an ordered
//! `serde_json` map and walked segment by segment along dotted paths.

pub use serde_json::Value;

/// Ordered field map of a document (insertion order is preserved).
pub type JsonMap = serde_json::Map<String, Value>;

/// Looks up a dotted field path (`"details.mobile"`) inside a field map.
pub fn get_path<'a>(fields: &'a JsonMap, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at a dotted field path, creating intermediate maps.
///
/// Intermediate values that are not maps are replaced, matching field-level
/// update semantics of document stores.
pub fn set_path(fields: &mut JsonMap, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = fields;
    for segment in segments {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(JsonMap::new()));
        if !slot.is_object() {
            *slot = Value::Object(JsonMap::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(leaf.to_string(), value);
}

/// JavaScript-style truthiness.
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy; every object and array,
/// even an empty one, is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Deep structural equality.
///
/// Numbers compare by numeric value (`1 == 1.0`) and object key order is
/// ignored. Nested arrays compare element-wise in order.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Equality over optional field values; an absent field only equals another
/// absent field (absent and `null` differ).
pub fn fields_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => values_equal(x, y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn get_path_walks_nested_maps() {
        let fields = map(json!({"details": {"mobile": "123"}, "name": "John"}));
        assert_eq!(get_path(&fields, "name"), Some(&json!("John")));
        assert_eq!(get_path(&fields, "details.mobile"), Some(&json!("123")));
        assert_eq!(get_path(&fields, "details.missing"), None);
        assert_eq!(get_path(&fields, "name.first"), None);
    }

    #[test]
    fn set_path_creates_and_replaces_intermediates() {
        let mut fields = map(json!({"user": "flat"}));
        set_path(&mut fields, "user.profile.id", json!("u1"));
        set_path(&mut fields, "other", json!(true));

        assert_eq!(
            Value::Object(fields),
            json!({"user": {"profile": {"id": "u1"}}, "other": true})
        );
    }

    #[test]
    fn truthiness_matches_javascript() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(1), json!("a"), json!([]), json!({})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn deep_equality_compares_content() {
        assert!(values_equal(&json!({"a": [1, {"b": 2}]}), &json!({"a": [1, {"b": 2}]})));
        assert!(values_equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": null})));
        assert!(!fields_equal(None, Some(&json!(null))));
        assert!(fields_equal(None, None));
    }
}
