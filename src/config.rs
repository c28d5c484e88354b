//! Tunable fusion configuration

use serde::{Deserialize, Serialize};

/// Weighting parameters for TSDF integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Confidence weight added per depth sample
    pub sample_weight: f32,
    /// Cap on accumulated voxel weight; bounds the influence of old samples
    /// as the scene is revisited
    pub max_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            sample_weight: 1.0,
            max_weight: 100.0,
        }
    }
}
