//! RustFusion - multi-camera volumetric reconstruction in pure Rust
//!
//! Incrementally fuses depth streams from static, pre-calibrated RGBD
//! cameras into a truncated signed-distance field, and extracts the
//! reconstruction by raycasting (depth/normal images from a virtual
//! viewpoint) or marching-cubes triangulation (surface mesh).
//!
//! ## Quick Start
//!
//! ```rust
//! use glam::{Mat4, UVec3, Vec3};
//! use rustfusion::{FusionConfig, MultiCameraPipeline, SimilarityTransform, SE3};
//!
//! let cameras = vec![rustfusion::test_utils::plane_test_parameters(SE3::identity())];
//! let mut pipeline = MultiCameraPipeline::new(
//!     cameras,
//!     UVec3::splat(17),
//!     SimilarityTransform::from_scale_translation(0.25, Vec3::new(-2.0, -2.0, 0.5)),
//!     0.75,
//!     FusionConfig::default(),
//! )
//! .unwrap();
//!
//! let frame = vec![2.0f32; 64 * 64];
//! pipeline.notify_input_updated(0, &frame).unwrap();
//! pipeline.fuse_multiple();
//! let mesh = pipeline.triangulate(Mat4::IDENTITY);
//! assert!(!mesh.is_empty());
//! ```

// Re-export core types
pub use crate::config::FusionConfig;
pub use crate::core::{
    CalibratedPosedCamera, DepthFrame, DepthMap, Intrinsics, PerspectiveCamera,
    RgbdCameraParameters, SimilarityTransform, SE3,
};
pub use crate::depth::DepthProcessor;
pub use crate::fusion::{Mesh, RaycastMode, RaycastOutput, TsdfVolume, Voxel};
pub use crate::pipeline::{MultiCameraPipeline, PipelineError};

// Modules
pub mod config;
pub mod core;
pub mod depth;
pub mod fusion;
pub mod pipeline;
pub mod test_utils;
