use serde::{Deserialize, Serialize};

use crate::actor::DEFAULT_BATCH_SIZE;
use crate::depth::DepthPolicy;
use crate::layout::ThumbnailRule;

/// Renderer tuning that is not part of the user-facing appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub depth: DepthPolicy,
    /// Actors added to a pool each time it runs dry.
    pub pool_batch_size: usize,
    pub thumbnails: ThumbnailRule,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            depth: DepthPolicy::default(),
            pool_batch_size: DEFAULT_BATCH_SIZE,
            thumbnails: ThumbnailRule::default(),
        }
    }
}
