//! Volumetric fusion engine
//!
//! The single source of truth for the reconstructed scene:
//! - tsdf_volume.rs: voxel storage and weighted depth integration
//! - raycast.rs: fixed-step and adaptive ray marching through the field
//! - marching_cubes.rs: isosurface triangulation of the zero level-set

pub mod marching_cubes;
pub mod raycast;
pub mod tsdf_volume;

pub use marching_cubes::Mesh;
pub use raycast::{RaycastMode, RaycastOutput};
pub use tsdf_volume::{TsdfVolume, Voxel};
