use crate::core::{DenormError, DocumentChange, Result};
use crate::engine::Denormalizer;
use crate::events;
use tracing::{Level, event};

/// Handles an update of a source document.
///
/// Returns `None` when no tracked field changed, otherwise the number of
/// target updates staged. Target list lengths were already checked when
/// `denormalizer` was built.
pub async fn on_update(denormalizer: &Denormalizer, change: &DocumentChange) -> Result<Option<usize>> {
    if change.before.id != change.after.id {
        let reason = "before and after snapshots belong to different documents";
        events::event_data_invalid(reason);
        return Err(DenormError::Dispatch(reason.to_string()));
    }

    if !denormalizer.detect_changes(change).any_changed() {
        event!(Level::DEBUG, doc_id = %change.after.id, "no tracked field changed");
        return Ok(None);
    }

    denormalizer.propagate(&change.after).await.map(Some)
}
