//! Denormalization configuration.
//!
//! The configuration is loaded once from the environment of the hosting
//! runtime and validated before any propagation runs.

use crate::core::{DenormError, Result};
use crate::engine::resolve_target_field_path;
use crate::events;
use serde::Serialize;

/// Placeholder standing for the source document id inside target field paths.
pub const DOC_ID_WILDCARD: &str = "{docId}";

/// Number of source documents processed per backfill batch.
pub const DEFAULT_BATCH_UPDATE_LIMIT: usize = 10;

/// Retry settings applied by the backfill dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillRetryPolicy {
    /// Total attempts per dispatch, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub min_backoff_ms: u64,
    /// Upper bound for the exponential delay in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for BackfillRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_backoff_ms: 5_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl BackfillRetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let base = self.min_backoff_ms;
        let cap = self.max_backoff_ms.max(base);

        let mut backoff = base;
        for _ in 1..attempt {
            backoff = backoff.saturating_mul(2).min(cap);
        }
        backoff
    }
}

/// Denormalization settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DenormConfig {
    /// Identifier of the deployed instance (used to name its task queue)
    pub instance_id: String,

    /// Project hosting the transform function
    pub project_id: String,

    /// Region of the deployed functions
    pub location: String,

    /// Collection whose documents are the source of truth
    pub source_collection_name: String,

    /// Source field paths whose changes trigger propagation
    pub source_document_fields: Vec<String>,

    /// Optional remote function computing the denormalized payload
    pub source_denormalize_function_name: Option<String>,

    /// Base URL overriding the default function endpoint (emulators, proxies)
    pub denormalize_function_base_url: Option<String>,

    /// Target collections, paired by index with `target_document_fields`
    pub target_collection_names: Vec<String>,

    /// Link field path templates inside each target collection
    pub target_document_fields: Vec<String>,

    /// Whether the backfill task does any work
    pub do_backfill: bool,

    pub doc_id_wildcard: String,

    pub batch_update_limit: usize,

    pub retry: BackfillRetryPolicy,
}

impl DenormConfig {
    /// Create a configuration for one source collection with no targets yet
    pub fn new(source_collection_name: &str) -> Self {
        Self {
            instance_id: "denormsync".to_string(),
            project_id: String::new(),
            location: "us-central1".to_string(),
            source_collection_name: source_collection_name.to_string(),
            source_document_fields: Vec::new(),
            source_denormalize_function_name: None,
            denormalize_function_base_url: None,
            target_collection_names: Vec::new(),
            target_document_fields: Vec::new(),
            do_backfill: false,
            doc_id_wildcard: DOC_ID_WILDCARD.to_string(),
            batch_update_limit: DEFAULT_BATCH_UPDATE_LIMIT,
            retry: BackfillRetryPolicy::default(),
        }
    }

    /// Add a tracked source field path
    pub fn track_field(mut self, path: &str) -> Self {
        self.source_document_fields.push(path.to_string());
        self
    }

    /// Add a target collection and its link field template
    pub fn target(mut self, collection: &str, field_path: &str) -> Self {
        self.target_collection_names.push(collection.to_string());
        self.target_document_fields.push(field_path.to_string());
        self
    }

    /// Set the remote denormalize function
    pub fn denormalize_function(mut self, name: &str) -> Self {
        self.source_denormalize_function_name = Some(name.to_string());
        self
    }

    /// Set the base URL used to reach the denormalize function
    pub fn denormalize_function_base_url(mut self, url: &str) -> Self {
        self.denormalize_function_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    /// Set the project id
    pub fn project_id(mut self, project_id: &str) -> Self {
        self.project_id = project_id.to_string();
        self
    }

    /// Set the region
    pub fn location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    /// Enable or disable backfill
    pub fn do_backfill(mut self, enabled: bool) -> Self {
        self.do_backfill = enabled;
        self
    }

    /// Set the backfill page size
    pub fn batch_update_limit(mut self, limit: usize) -> Self {
        self.batch_update_limit = limit;
        self
    }

    /// Set the backfill retry policy
    pub fn retry(mut self, retry: BackfillRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// Required: `LOCATION`, `SOURCE_COLLECTION_NAME`, `SOURCE_DOCUMENT_FIELDS`,
    /// `TARGET_COLLECTION_NAMES`, `TARGET_DOCUMENT_FIELDS`. List values are
    /// comma separated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    let reason = format!("{} must be a string", key);
                    events::invalid_environment_variables(&reason);
                    DenormError::Configuration(reason)
                })
        };
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let location = required("LOCATION")?;
        let source_collection_name = required("SOURCE_COLLECTION_NAME")?;
        let source_document_fields = split_list(&required("SOURCE_DOCUMENT_FIELDS")?);
        let target_collection_names = split_list(&required("TARGET_COLLECTION_NAMES")?);
        let target_document_fields = split_list(&required("TARGET_DOCUMENT_FIELDS")?);

        let batch_update_limit = match optional("BATCH_UPDATE_LIMIT") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                let reason = format!("BATCH_UPDATE_LIMIT must be a positive integer, got '{}'", raw);
                events::invalid_environment_variables(&reason);
                DenormError::Configuration(reason)
            })?,
            None => DEFAULT_BATCH_UPDATE_LIMIT,
        };

        Ok(Self {
            instance_id: optional("EXT_INSTANCE_ID").unwrap_or_else(|| "denormsync".to_string()),
            project_id: optional("PROJECT_ID").unwrap_or_default(),
            location,
            source_collection_name,
            source_document_fields,
            source_denormalize_function_name: optional("SOURCE_DENORMALIZE_FUNCTION_NAME"),
            denormalize_function_base_url: optional("DENORMALIZE_FUNCTION_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            target_collection_names,
            target_document_fields,
            do_backfill: lookup("DO_BACKFILL").as_deref() == Some("true"),
            doc_id_wildcard: DOC_ID_WILDCARD.to_string(),
            batch_update_limit,
            retry: BackfillRetryPolicy::default(),
        })
    }

    /// Checks every invariant the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.source_collection_name.trim().is_empty() {
            return Err(invalid("Source collection name must not be empty".to_string()));
        }
        if self.source_document_fields.is_empty() {
            return Err(invalid("At least one source document field must be tracked".to_string()));
        }
        self.validate_target_lengths()?;
        for field_path in &self.target_document_fields {
            resolve_target_field_path(field_path)?;
        }
        if self.doc_id_wildcard.is_empty() {
            return Err(invalid("Document id wildcard must not be empty".to_string()));
        }
        if self.batch_update_limit == 0 {
            return Err(invalid("Batch update limit must be greater than zero".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("Backfill retry policy needs at least one attempt".to_string()));
        }
        Ok(())
    }

    /// Target collection names and field paths are paired by index.
    pub fn validate_target_lengths(&self) -> Result<()> {
        let collections = self.target_collection_names.len();
        let fields = self.target_document_fields.len();
        if collections != fields {
            return Err(invalid(format!(
                "Collection names ({} elements) and target field paths ({} elements) must have the same number of elements",
                collections, fields
            )));
        }
        Ok(())
    }

    /// URL of the configured denormalize function, if any.
    pub fn transform_endpoint(&self) -> Option<String> {
        let name = self.source_denormalize_function_name.as_deref()?;
        Some(match &self.denormalize_function_base_url {
            Some(base) => format!("{}/{}", base, name),
            None => format!(
                "https://{}-{}.cloudfunctions.net/{}",
                self.location, self.project_id, name
            ),
        })
    }

    /// Pairs of `(target collection, field path template)` in index order.
    pub fn targets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.target_collection_names
            .iter()
            .map(String::as_str)
            .zip(self.target_document_fields.iter().map(String::as_str))
    }
}

fn invalid(reason: String) -> DenormError {
    events::config_invalid(&reason);
    DenormError::Configuration(reason)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn base_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("LOCATION", "europe-west1"),
            ("PROJECT_ID", "demo-test"),
            ("SOURCE_COLLECTION_NAME", "users"),
            ("SOURCE_DOCUMENT_FIELDS", "firstname,lastname,details.mobile"),
            ("TARGET_COLLECTION_NAMES", "posts,comments"),
            ("TARGET_DOCUMENT_FIELDS", "author.id,users.{docId}.id"),
            ("DO_BACKFILL", "true"),
        ]
    }

    #[test]
    fn loads_from_environment() {
        let config = DenormConfig::from_lookup(env(&base_env())).unwrap();

        assert_eq!(config.source_collection_name, "users");
        assert_eq!(
            config.source_document_fields,
            vec!["firstname", "lastname", "details.mobile"]
        );
        assert_eq!(config.target_collection_names, vec!["posts", "comments"]);
        assert_eq!(config.target_document_fields, vec!["author.id", "users.{docId}.id"]);
        assert!(config.do_backfill);
        assert_eq!(config.doc_id_wildcard, "{docId}");
        assert_eq!(config.batch_update_limit, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_required_variable_is_a_configuration_error() {
        let vars: Vec<_> = base_env()
            .into_iter()
            .filter(|(k, _)| *k != "TARGET_DOCUMENT_FIELDS")
            .collect();
        let err = DenormConfig::from_lookup(env(&vars)).unwrap_err();
        assert!(matches!(err, DenormError::Configuration(msg) if msg.contains("TARGET_DOCUMENT_FIELDS")));
    }

    #[test]
    fn backfill_is_only_enabled_by_literal_true() {
        let mut vars = base_env();
        vars.retain(|(k, _)| *k != "DO_BACKFILL");
        vars.push(("DO_BACKFILL", "yes"));
        assert!(!DenormConfig::from_lookup(env(&vars)).unwrap().do_backfill);
    }

    #[test]
    fn mismatched_target_lists_fail_validation() {
        let mut config = DenormConfig::new("users").track_field("firstname").target("posts", "author.id");
        config.target_document_fields.push("editor.id".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("(1 elements)"));
        assert!(err.to_string().contains("(2 elements)"));
    }

    #[test]
    fn single_segment_target_path_fails_validation() {
        let config = DenormConfig::new("users").track_field("firstname").target("posts", "author");
        assert!(matches!(config.validate(), Err(DenormError::Configuration(_))));
    }

    #[test]
    fn transform_endpoint_prefers_base_url() {
        let config = DenormConfig::new("users")
            .project_id("demo")
            .location("europe-west1")
            .denormalize_function("denormalizeUser");
        assert_eq!(
            config.transform_endpoint().as_deref(),
            Some("https://europe-west1-demo.cloudfunctions.net/denormalizeUser")
        );

        let config = config.denormalize_function_base_url("http://127.0.0.1:5001/demo/europe-west1/");
        assert_eq!(
            config.transform_endpoint().as_deref(),
            Some("http://127.0.0.1:5001/demo/europe-west1/denormalizeUser")
        );

        assert_eq!(DenormConfig::new("users").transform_endpoint(), None);
    }

    #[test]
    fn retry_backoff_doubles_up_to_cap() {
        let policy = BackfillRetryPolicy {
            max_attempts: 5,
            min_backoff_ms: 100,
            max_backoff_ms: 350,
        };
        assert_eq!(policy.backoff_ms(1), 100);
        assert_eq!(policy.backoff_ms(2), 200);
        assert_eq!(policy.backoff_ms(3), 350);
        assert_eq!(policy.backoff_ms(4), 350);
    }
}
