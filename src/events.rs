//! Structured observability events.
//!
//! Every event the engine emits goes through one of these functions so the
//! field names stay stable for log queries. All events use the `denormsync`
//! target.

use crate::core::{JsonMap, TargetQueryFailure};
use crate::engine::FieldDiff;
use std::collections::BTreeMap;
use tracing::{Level, event};

pub fn invalid_environment_variables(reason: &str) {
    event!(target: "denormsync", Level::ERROR, reason, "invalid environment variables");
}

pub fn config_invalid(reason: &str) {
    event!(target: "denormsync", Level::ERROR, reason, "configuration invalid");
}

pub fn source_document_field_changed(diffs: &BTreeMap<String, FieldDiff>) {
    let changed_paths = serde_json::to_string(diffs).unwrap_or_default();
    event!(
        target: "denormsync",
        Level::INFO,
        changed_paths = %changed_paths,
        "source document field changed"
    );
}

pub fn event_data_invalid(reason: &str) {
    event!(target: "denormsync", Level::WARN, reason, "event data invalid");
}

pub fn previous_value_invalid(target_path: &str, parent_path: &str, target_fields: &JsonMap) {
    let target_data = serde_json::to_string(target_fields).unwrap_or_default();
    event!(
        target: "denormsync",
        Level::WARN,
        target_path,
        parent_path,
        target_data = %target_data,
        "previous value invalid"
    );
}

pub fn target_queries_failed(failures: &[TargetQueryFailure]) {
    for failure in failures {
        event!(
            target: "denormsync",
            Level::ERROR,
            collection = %failure.collection,
            field_path = %failure.field_path,
            error = %failure.error,
            "target query failed"
        );
    }
}

pub fn denormalize_function_failed(url: &str, status: u16, status_text: &str, content_type: &str) {
    event!(
        target: "denormsync",
        Level::ERROR,
        url,
        status,
        status_text,
        content_type,
        "denormalize function failed"
    );
}

pub fn write_failed(target_path: &str, reason: &str) {
    event!(target: "denormsync", Level::WARN, target_path, reason, "target write failed");
}

pub fn update_completed(docs_updated: usize) {
    event!(
        target: "denormsync",
        Level::INFO,
        docs_updated,
        "Update completed for {} documents",
        docs_updated
    );
}

pub fn update_failed(reason: &str, trigger_doc_id: &str, error: &str) {
    event!(
        target: "denormsync",
        Level::ERROR,
        trigger_doc_id,
        error,
        "{}",
        reason
    );
}

pub fn backfill_completed(source_collection: &str, source_docs: u64, target_docs: u64) {
    event!(
        target: "denormsync",
        Level::INFO,
        source_collection,
        source_docs,
        target_docs,
        "Resync all documents completed for collection {}. Read {} source documents and {} target documents",
        source_collection,
        source_docs,
        target_docs
    );
}

pub fn backfill_skipped(source_collection: &str) {
    event!(target: "denormsync", Level::INFO, source_collection, "backfill disabled, resync skipped");
}

pub fn backfill_failed(reason: &str, error: &str) {
    event!(target: "denormsync", Level::ERROR, error, "{}", reason);
}
