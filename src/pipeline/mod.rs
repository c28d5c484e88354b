//! Multi-camera fusion pipeline
//!
//! Owns the camera registry, the per-camera depth buffers and the TSDF
//! volume, and sequences per-frame ingestion, fusion and queries. This is
//! the sole entry point consumed by presentation layers; everything handed
//! out is a read-only view.

use std::time::Instant;

use glam::{Mat3, Mat4, UVec2, UVec3, Vec3};
use log::{debug, info};
use thiserror::Error;

use crate::config::FusionConfig;
use crate::core::{
    CalibratedPosedCamera, DepthFrame, DepthMap, PerspectiveCamera, RgbdCameraParameters,
    SimilarityTransform,
};
use crate::depth::DepthProcessor;
use crate::fusion::{Mesh, RaycastMode, RaycastOutput, TsdfVolume};

/// Construction-time and ingestion contract failures.
///
/// Steady-state fuse/raycast/triangulate calls do not fail; an out-of-range
/// camera index is a caller contract violation and panics.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline requires at least one camera")]
    NoCameras,
    #[error("grid resolution must be nonzero in every dimension, got {0:?}")]
    ZeroGridResolution(UVec3),
    #[error("camera {camera}: undistortion map holds {actual} offsets, expected {expected}")]
    UndistortMapSize {
        camera: usize,
        expected: usize,
        actual: usize,
    },
    #[error("camera {camera}: depth buffer holds {actual} pixels, expected {expected}")]
    DepthBufferSize {
        camera: usize,
        expected: usize,
        actual: usize,
    },
}

/// Orchestrates N static, pre-calibrated depth cameras feeding one TSDF grid.
pub struct MultiCameraPipeline {
    cameras: Vec<RgbdCameraParameters>,
    processors: Vec<DepthProcessor>,
    frames: Vec<DepthFrame>,
    volume: TsdfVolume,
}

impl MultiCameraPipeline {
    /// Build a pipeline over a fixed camera set and grid geometry.
    ///
    /// All storage is allocated here; a validation failure leaves no
    /// partial state behind.
    pub fn new(
        cameras: Vec<RgbdCameraParameters>,
        grid_resolution: UVec3,
        world_from_grid: SimilarityTransform,
        max_truncation: f32,
        config: FusionConfig,
    ) -> Result<Self, PipelineError> {
        if cameras.is_empty() {
            return Err(PipelineError::NoCameras);
        }
        if grid_resolution.x == 0 || grid_resolution.y == 0 || grid_resolution.z == 0 {
            return Err(PipelineError::ZeroGridResolution(grid_resolution));
        }
        for (i, camera) in cameras.iter().enumerate() {
            let expected = camera.num_depth_pixels();
            if camera.undistort_map.len() != expected {
                return Err(PipelineError::UndistortMapSize {
                    camera: i,
                    expected,
                    actual: camera.undistort_map.len(),
                });
            }
        }

        let processors = cameras
            .iter()
            .map(|c| DepthProcessor::new(c.depth_resolution))
            .collect();
        let frames = cameras
            .iter()
            .map(|c| DepthFrame::new(c.depth_resolution))
            .collect();
        let volume = TsdfVolume::new(grid_resolution, world_from_grid, max_truncation, config);

        info!(
            "fusion pipeline: {} cameras, grid {}x{}x{}, truncation {}",
            cameras.len(),
            grid_resolution.x,
            grid_resolution.y,
            grid_resolution.z,
            max_truncation
        );

        Ok(Self {
            cameras,
            processors,
            frames,
            volume,
        })
    }

    /// Number of cameras, fixed at construction.
    pub fn num_cameras(&self) -> usize {
        self.cameras.len()
    }

    /// Calibration of camera `i`. Panics if `i` is out of range.
    pub fn camera_parameters(&self, i: usize) -> &RgbdCameraParameters {
        &self.cameras[i]
    }

    /// Posed frustum of depth camera `i`, for display collaborators.
    pub fn depth_camera(&self, i: usize) -> PerspectiveCamera {
        let params = &self.cameras[i];
        PerspectiveCamera {
            camera_from_world: params.camera_from_world,
            intrinsics: params.depth_intrinsics,
            resolution: params.depth_resolution,
            z_near: params.depth_range.x,
            z_far: params.depth_range.y,
        }
    }

    /// Raw depth buffer of camera `i`, as last ingested.
    pub fn raw_depth(&self, i: usize) -> &DepthMap {
        &self.frames[i].raw
    }

    /// Undistorted depth buffer of camera `i`.
    pub fn undistorted_depth(&self, i: usize) -> &DepthMap {
        &self.frames[i].undistorted
    }

    /// World-space bounding box of the TSDF grid.
    pub fn tsdf_bounding_box(&self) -> (Vec3, Vec3) {
        self.volume.bounding_box()
    }

    /// The grid-to-world similarity transform.
    pub fn tsdf_world_from_grid(&self) -> SimilarityTransform {
        self.volume.world_from_grid()
    }

    /// Read-only view of the volume, for diagnostics.
    pub fn volume(&self) -> &TsdfVolume {
        &self.volume
    }

    /// Ingest a new raw depth frame for camera `i` and undistort it.
    ///
    /// Overwrites that camera's buffers only; the grid and all other
    /// cameras are untouched.
    pub fn notify_input_updated(&mut self, i: usize, raw_depth: &[f32]) -> Result<(), PipelineError> {
        let expected = self.cameras[i].num_depth_pixels();
        if raw_depth.len() != expected {
            return Err(PipelineError::DepthBufferSize {
                camera: i,
                expected,
                actual: raw_depth.len(),
            });
        }

        let frame = &mut self.frames[i];
        frame.raw.copy_from_slice(raw_depth);
        self.processors[i].undistort(&frame.raw, &self.cameras[i].undistort_map, &mut frame.undistorted);
        Ok(())
    }

    /// Integrate every camera sequentially, one full volume pass each.
    pub fn fuse(&mut self) {
        let start = Instant::now();
        for (params, frame) in self.cameras.iter().zip(self.frames.iter()) {
            let camera = CalibratedPosedCamera::from_parameters(params);
            self.volume.fuse(&camera, &frame.undistorted);
        }
        debug!(
            "fuse: {} cameras in {:.2} ms",
            self.cameras.len(),
            start.elapsed().as_secs_f64() * 1e3
        );
    }

    /// Integrate every camera in a single volume pass.
    ///
    /// The batch is sized by `num_cameras()`; voxel traversal dominates
    /// fusion cost, so evaluating all cameras per voxel amortizes it.
    pub fn fuse_multiple(&mut self) {
        let start = Instant::now();
        let batch: Vec<CalibratedPosedCamera> = self
            .cameras
            .iter()
            .map(CalibratedPosedCamera::from_parameters)
            .collect();
        let depths: Vec<&DepthMap> = self.frames.iter().map(|f| &f.undistorted).collect();
        self.volume.fuse_multiple(&batch, &depths);
        debug!(
            "fuse_multiple: {} cameras in {:.2} ms",
            batch.len(),
            start.elapsed().as_secs_f64() * 1e3
        );
    }

    /// Raycast the grid from a virtual viewpoint into `out`.
    ///
    /// The marching strategy is an explicit per-call choice, never ambient
    /// state. Intrinsics are rescaled to the output resolution.
    pub fn raycast(&self, view: &PerspectiveCamera, mode: RaycastMode, out: &mut RaycastOutput) {
        let intrinsics =
            view.intrinsics_for(UVec2::new(out.width() as u32, out.height() as u32));
        self.volume.raycast(
            intrinsics.flpp(),
            view.world_from_camera().to_matrix(),
            mode,
            out,
        );
    }

    /// Extract the surface mesh and express it in the caller's output space.
    ///
    /// Positions are mapped by the affine transform, normals by its
    /// inverse-transpose rotation; the grid itself is never mutated.
    pub fn triangulate(&self, output_from_world: Mat4) -> Mesh {
        let mut mesh = self.volume.triangulate();
        let normal_matrix = Mat3::from_mat4(output_from_world).inverse().transpose();
        for p in &mut mesh.positions {
            *p = output_from_world.transform_point3(*p);
        }
        for n in &mut mesh.normals {
            *n = (normal_matrix * *n).normalize_or_zero();
        }
        mesh
    }

    /// Clear the grid back to its information-free state.
    pub fn reset(&mut self) {
        self.volume.reset();
        info!("fusion pipeline reset");
    }
}
