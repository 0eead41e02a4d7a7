use crate::core::{DenormError, Result};
use crate::events;

/// Splits a target field path template into its parent container path and
/// leaf segment.
///
/// `"users.{docId}.address.id"` resolves to `("users.{docId}.address", "id")`.
/// The template must name both a container and a field, so a single segment
/// (or an empty leaf) is a configuration error.
pub fn resolve_target_field_path(path: &str) -> Result<(String, String)> {
    match path.rsplit_once('.') {
        Some((parent, leaf)) if !leaf.is_empty() => Ok((parent.to_string(), leaf.to_string())),
        _ => {
            let reason = format!(
                "Target field path {} should have at least two segments delimited by a '.'",
                path
            );
            events::config_invalid(&reason);
            Err(DenormError::Configuration(reason))
        }
    }
}

/// Replaces every occurrence of `wildcard` in `template` with `doc_id`.
pub fn substitute_wildcard(template: &str, wildcard: &str, doc_id: &str) -> String {
    template.replace(wildcard, doc_id)
}
