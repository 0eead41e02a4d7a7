use super::merge::{anchor_transformed, merge_embedded};
use super::{Denormalizer, TargetBinding};
use crate::core::{DenormError, DocumentSnapshot, Result, TargetQueryFailure, Value};
use crate::events;
use crate::store::{CollectionScope, EqualityQuery, FieldUpdate};
use crate::transform::DenormalizeStrategy;
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{Instrument, info_span};

impl Denormalizer {
    /// Propagates the tracked fields of `source` into every target document
    /// embedding a copy of it.
    ///
    /// Returns the number of target updates staged. Every target query runs
    /// concurrently; if any of them fails nothing is written and the error
    /// lists all failures. Target documents whose embedded object is missing
    /// or not an object are skipped with a warning. A remote transform is
    /// called at most once, and only when some target is left to update.
    pub async fn propagate(&self, source: &DocumentSnapshot) -> Result<usize> {
        let span = info_span!("denormsync.propagate", source_path = %source.path);

        match self.propagate_staged(source).instrument(span).await {
            Ok(count) => {
                events::update_completed(count);
                Ok(count)
            }
            Err(err) => {
                events::update_failed(
                    &format!(
                        "An error occurred while updating documents triggered by an update of: {}",
                        source.path
                    ),
                    &source.id,
                    &err.to_string(),
                );
                Err(err.in_propagation_of(&source.path))
            }
        }
    }

    async fn propagate_staged(&self, source: &DocumentSnapshot) -> Result<usize> {
        let matches = self.query_targets(source).await?;

        let mut embeddings = Vec::new();
        for (binding, docs) in &matches {
            let parent_path = self.substitute(&binding.parent_template, &source.id);
            for doc in docs {
                match doc.get(&parent_path) {
                    Some(Value::Object(previous)) => {
                        embeddings.push((*binding, doc, parent_path.clone(), previous))
                    }
                    _ => events::previous_value_invalid(&doc.path, &parent_path, &doc.fields),
                }
            }
        }

        let transformed = match &self.strategy {
            DenormalizeStrategy::Remote(invoker) if !embeddings.is_empty() => {
                Some(invoker.invoke(source).await?)
            }
            _ => None,
        };

        let updates: Vec<FieldUpdate> = embeddings
            .into_iter()
            .map(|(binding, doc, parent_path, previous)| {
                let next = match &transformed {
                    Some(payload) => anchor_transformed(payload, &source.id, &binding.link_field),
                    None => merge_embedded(previous, source, &binding.link_field),
                };
                FieldUpdate {
                    document_path: doc.path.clone(),
                    field_path: parent_path,
                    value: Value::Object(next),
                }
            })
            .collect();

        let staged = updates.len();
        let report = self.store.bulk_update(updates).await?;
        for (path, error) in &report.failures {
            events::write_failed(path, &error.to_string());
        }
        Ok(staged)
    }

    /// Runs one equality query per target and joins them all before
    /// deciding whether to abort.
    async fn query_targets<'a>(
        &'a self,
        source: &DocumentSnapshot,
    ) -> Result<Vec<(&'a TargetBinding, Vec<DocumentSnapshot>)>> {
        let roots: HashSet<String> = self
            .store
            .list_root_collections()
            .await?
            .into_iter()
            .collect();

        let queries: Vec<EqualityQuery> = self
            .targets
            .iter()
            .map(|binding| {
                let scope = if roots.contains(&binding.collection) {
                    CollectionScope::Root(binding.collection.clone())
                } else {
                    CollectionScope::Group(binding.collection.clone())
                };
                EqualityQuery {
                    scope,
                    field_path: self.substitute(&binding.field_template, &source.id),
                    value: Value::String(source.id.clone()),
                }
            })
            .collect();

        let results = join_all(queries.iter().map(|query| self.store.query(query))).await;

        let mut matches = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for ((binding, query), result) in self.targets.iter().zip(&queries).zip(results) {
            match result {
                Ok(docs) => matches.push((binding, docs)),
                Err(error) => failures.push(TargetQueryFailure {
                    collection: binding.collection.clone(),
                    field_path: query.field_path.clone(),
                    error,
                }),
            }
        }

        if !failures.is_empty() {
            events::target_queries_failed(&failures);
            return Err(DenormError::TargetQuery(failures));
        }
        Ok(matches)
    }
}
