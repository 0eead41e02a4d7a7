//! Denormalized payload strategies.
//!
//! The payload written into target documents is either merged from the
//! previously embedded object (`Merge`) or computed by a remote function
//! (`Remote`). The strategy is chosen once from configuration.

mod http;

use crate::config::DenormConfig;
use crate::core::{DocumentSnapshot, JsonMap, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub use http::HttpTransform;

/// Computes a denormalized payload from a full source document.
#[async_trait]
pub trait TransformInvoker: Send + Sync {
    async fn invoke(&self, source: &DocumentSnapshot) -> Result<JsonMap>;
}

#[derive(Clone)]
pub enum DenormalizeStrategy {
    /// Merge the source fields into the previously embedded object.
    Merge,
    /// Use the object returned by a transform, once per propagation.
    Remote(Arc<dyn TransformInvoker>),
}

impl DenormalizeStrategy {
    /// `Remote` over HTTP when a denormalize function is configured.
    pub fn from_config(config: &DenormConfig) -> Self {
        match config.transform_endpoint() {
            Some(url) => Self::Remote(Arc::new(HttpTransform::new(url))),
            None => Self::Merge,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Debug for DenormalizeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => f.write_str("Merge"),
            Self::Remote(_) => f.write_str("Remote"),
        }
    }
}
