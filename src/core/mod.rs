//! Core data structures for RustFusion

pub mod camera;
pub mod frame;
pub mod pose;
pub mod transform;

pub use camera::{CalibratedPosedCamera, Intrinsics, PerspectiveCamera, RgbdCameraParameters};
pub use frame::{DepthFrame, DepthMap};
pub use pose::SE3;
pub use transform::SimilarityTransform;
