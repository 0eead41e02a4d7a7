use std::fmt;
use thiserror::Error;

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query on '{collection}' filtered by '{field_path}' requires an index")]
    MissingIndex {
        collection: String,
        field_path: String,
    },

    #[error("Document '{0}' not found")]
    NotFound(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Write to '{path}' failed: {reason}")]
    Write { path: String, reason: String },
}

/// One failed target query, kept for the aggregated [`DenormError::TargetQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetQueryFailure {
    pub collection: String,
    pub field_path: String,
    pub error: StoreError,
}

impl fmt::Display for TargetQueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.collection, self.field_path, self.error)
    }
}

#[derive(Error, Debug)]
pub enum DenormError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Target queries failed: {}", join_failures(.0))]
    TargetQuery(Vec<TargetQueryFailure>),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Propagation from '{source_path}' failed: {source}")]
    Propagation {
        source_path: String,
        #[source]
        source: Box<DenormError>,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dispatch error: {0}")]
    Dispatch(String),
}

impl DenormError {
    /// Configuration problems and malformed payloads never go away on their
    /// own; everything else may.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::Json(_) => false,
            Self::Propagation { source, .. } => source.is_retryable(),
            _ => true,
        }
    }

    /// Wraps an error with the path of the source record being propagated.
    ///
    /// Errors that already carry a more precise classification are kept as-is.
    pub fn in_propagation_of(self, source_path: &str) -> Self {
        match self {
            Self::Configuration(_)
            | Self::TargetQuery(_)
            | Self::Transform(_)
            | Self::Propagation { .. } => self,
            other => Self::Propagation {
                source_path: source_path.to_string(),
                source: Box::new(other),
            },
        }
    }
}

fn join_failures(failures: &[TargetQueryFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<reqwest::Error> for DenormError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transform(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DenormError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_query_error_lists_every_failure() {
        let err = DenormError::TargetQuery(vec![
            TargetQueryFailure {
                collection: "posts".to_string(),
                field_path: "author.id".to_string(),
                error: StoreError::Unavailable("timeout".to_string()),
            },
            TargetQueryFailure {
                collection: "comments".to_string(),
                field_path: "user.id".to_string(),
                error: StoreError::MissingIndex {
                    collection: "comments".to_string(),
                    field_path: "user.id".to_string(),
                },
            },
        ]);

        let message = err.to_string();
        assert!(message.contains("posts/author.id: Store unavailable: timeout"));
        assert!(message.contains("comments/user.id"));
    }

    #[test]
    fn configuration_errors_are_not_retryable() {
        assert!(!DenormError::Configuration("bad".into()).is_retryable());
        assert!(DenormError::Transform("bad".into()).is_retryable());

        let wrapped = DenormError::Store(StoreError::Unavailable("down".into()))
            .in_propagation_of("users/u1");
        assert!(matches!(wrapped, DenormError::Propagation { .. }));
        assert!(wrapped.is_retryable());
    }

    #[test]
    fn classified_errors_are_not_rewrapped() {
        let err = DenormError::Transform("status 500".into()).in_propagation_of("users/u1");
        assert!(matches!(err, DenormError::Transform(_)));
    }
}
