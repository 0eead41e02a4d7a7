//! Propagation engine.
//!
//! # Architecture
//!
//! - `path.rs` - target field path templates: parent/leaf split, wildcard substitution
//! - `change.rs` - decides whether an update touched a tracked field
//! - `merge.rs` - computes the next embedded object
//! - `propagate.rs` - fan-out of one source document into every target
//! - `backfill.rs` - paged resync of the whole source collection

mod backfill;
mod change;
mod merge;
mod path;
mod propagate;

use crate::config::DenormConfig;
use crate::core::{DocumentChange, Result};
use crate::store::DocumentStore;
use crate::transform::DenormalizeStrategy;
use std::sync::Arc;

pub use backfill::{BackfillCursor, BackfillProgress};
pub use change::{ChangeSet, FieldDiff, detect_changes};
pub use merge::{anchor_transformed, merge_embedded};
pub use path::{resolve_target_field_path, substitute_wildcard};

/// One configured target with its template pre-split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TargetBinding {
    pub(crate) collection: String,
    pub(crate) field_template: String,
    pub(crate) parent_template: String,
    pub(crate) link_field: String,
}

/// Keeps the denormalized copies of one source collection up to date.
///
/// Holds no progress state of its own; a single instance can serve
/// concurrent propagations and backfill batches.
pub struct Denormalizer {
    config: DenormConfig,
    store: Arc<dyn DocumentStore>,
    strategy: DenormalizeStrategy,
    targets: Vec<TargetBinding>,
}

impl Denormalizer {
    /// Validates `config` and picks the payload strategy it describes.
    pub fn new(config: DenormConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let strategy = DenormalizeStrategy::from_config(&config);
        Self::with_strategy(config, store, strategy)
    }

    /// Same as [`Denormalizer::new`] with an explicit payload strategy.
    pub fn with_strategy(
        config: DenormConfig,
        store: Arc<dyn DocumentStore>,
        strategy: DenormalizeStrategy,
    ) -> Result<Self> {
        config.validate()?;

        let targets = config
            .targets()
            .map(|(collection, field_template)| {
                let (parent_template, link_field) = resolve_target_field_path(field_template)?;
                Ok(TargetBinding {
                    collection: collection.to_string(),
                    field_template: field_template.to_string(),
                    parent_template,
                    link_field,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            store,
            strategy,
            targets,
        })
    }

    pub fn config(&self) -> &DenormConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn strategy(&self) -> &DenormalizeStrategy {
        &self.strategy
    }

    /// Compares the tracked fields of an update.
    pub fn detect_changes(&self, change: &DocumentChange) -> ChangeSet {
        detect_changes(&change.before, &change.after, &self.config.source_document_fields)
    }

    fn substitute(&self, template: &str, doc_id: &str) -> String {
        substitute_wildcard(template, &self.config.doc_id_wildcard, doc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DenormError;
    use crate::store::InMemoryDocumentStore;

    #[test]
    fn construction_validates_configuration() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());

        let config = DenormConfig::new("users")
            .track_field("firstname")
            .target("posts", "author.id")
            .target("teams", "members.{docId}.id");
        let denormalizer = Denormalizer::new(config, store.clone()).unwrap();
        assert_eq!(denormalizer.targets[1].parent_template, "members.{docId}");
        assert_eq!(denormalizer.targets[1].link_field, "id");

        let broken = DenormConfig::new("users").track_field("firstname").target("posts", "author");
        assert!(matches!(
            Denormalizer::new(broken, store),
            Err(DenormError::Configuration(_))
        ));
    }
}
