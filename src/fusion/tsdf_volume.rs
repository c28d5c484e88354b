//! TSDF volume: truncated signed-distance storage and depth fusion
//!
//! A dense voxel grid where each voxel holds a running signed distance to
//! the nearest observed surface (clamped to the truncation distance) and an
//! accumulated confidence weight. Depth maps are folded in with a weighted
//! running average; both the per-camera and the batched fusion paths apply
//! the identical per-sample update so they agree voxel for voxel.
//!
//! Fusion is a data-parallel map over the voxel index domain: one worker
//! per voxel, reading the depth buffers immutably, writing only its own
//! voxel.

use glam::{UVec3, Vec3};
use rayon::prelude::*;

use crate::config::FusionConfig;
use crate::core::{CalibratedPosedCamera, DepthMap, SimilarityTransform};

/// One cell of the TSDF grid.
///
/// An unobserved voxel holds the documented sentinel: `weight == 0.0` and
/// `distance == +max_truncation` (free-space prior).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel {
    /// Running signed distance estimate, in world units,
    /// always within [-max_truncation, +max_truncation]
    pub distance: f32,
    /// Accumulated confidence weight; non-negative, non-decreasing
    /// except on reset
    pub weight: f32,
}

impl Voxel {
    /// Fold one clamped signed-distance sample into the running average.
    #[inline]
    fn fold(&mut self, sdf: f32, sample_weight: f32, max_weight: f32) {
        let total = self.weight + sample_weight;
        self.distance = (self.weight * self.distance + sample_weight * sdf) / total;
        self.weight = total.min(max_weight);
    }
}

/// Dense TSDF voxel grid with fixed resolution and a similarity transform
/// mapping grid space to world space.
///
/// Voxel centers sit on the integer lattice of grid space: voxel (x, y, z)
/// is centered at grid point `(x, y, z)` and at
/// `world_from_grid.transform_point(Vec3::new(x, y, z))` in world space.
#[derive(Debug, Clone)]
pub struct TsdfVolume {
    pub(crate) resolution: UVec3,
    pub(crate) world_from_grid: SimilarityTransform,
    pub(crate) grid_from_world: SimilarityTransform,
    pub(crate) max_truncation: f32,
    pub(crate) config: FusionConfig,
    pub(crate) voxels: Vec<Voxel>,
    fused_passes: usize,
}

impl TsdfVolume {
    /// Allocate a grid of `resolution` voxels, all unobserved.
    ///
    /// `max_truncation` is the clamp magnitude for signed distances, in
    /// world units; it must be positive.
    pub fn new(
        resolution: UVec3,
        world_from_grid: SimilarityTransform,
        max_truncation: f32,
        config: FusionConfig,
    ) -> Self {
        assert!(
            resolution.x > 0 && resolution.y > 0 && resolution.z > 0,
            "grid resolution must be nonzero in every dimension"
        );
        assert!(max_truncation > 0.0, "max truncation must be positive");
        let count = resolution.x as usize * resolution.y as usize * resolution.z as usize;
        Self {
            resolution,
            world_from_grid,
            grid_from_world: world_from_grid.inverse(),
            max_truncation,
            config,
            voxels: vec![
                Voxel {
                    distance: max_truncation,
                    weight: 0.0,
                };
                count
            ],
            fused_passes: 0,
        }
    }

    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    pub fn world_from_grid(&self) -> SimilarityTransform {
        self.world_from_grid
    }

    pub fn max_truncation(&self) -> f32 {
        self.max_truncation
    }

    /// Number of completed fuse passes since construction or the last reset.
    pub fn fused_passes(&self) -> usize {
        self.fused_passes
    }

    /// Whether the grid holds no observations.
    pub fn is_empty(&self) -> bool {
        self.fused_passes == 0
    }

    /// Read one voxel; None outside the grid.
    pub fn voxel(&self, x: u32, y: u32, z: u32) -> Option<&Voxel> {
        if x >= self.resolution.x || y >= self.resolution.y || z >= self.resolution.z {
            return None;
        }
        Some(&self.voxels[self.linear_index(x, y, z)])
    }

    /// World-space axis-aligned bounding box of the voxel lattice.
    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        let extent = (self.resolution - UVec3::ONE).as_vec3();
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { 0.0 } else { extent.x },
                if i & 2 == 0 { 0.0 } else { extent.y },
                if i & 4 == 0 { 0.0 } else { extent.z },
            );
            let w = self.world_from_grid.transform_point(corner);
            min = min.min(w);
            max = max.max(w);
        }
        (min, max)
    }

    /// Clear every voxel back to the unobserved sentinel.
    pub fn reset(&mut self) {
        let sentinel = Voxel {
            distance: self.max_truncation,
            weight: 0.0,
        };
        self.voxels.fill(sentinel);
        self.fused_passes = 0;
    }

    #[inline]
    pub(crate) fn linear_index(&self, x: u32, y: u32, z: u32) -> usize {
        ((z * self.resolution.y + y) * self.resolution.x + x) as usize
    }

    /// Grid-space voxel center for a linear voxel index.
    #[inline]
    fn grid_point(index: usize, resolution: UVec3) -> Vec3 {
        let rx = resolution.x as usize;
        let ry = resolution.y as usize;
        let x = index % rx;
        let y = (index / rx) % ry;
        let z = index / (rx * ry);
        Vec3::new(x as f32, y as f32, z as f32)
    }

    /// Integrate one camera's undistorted depth map: one full voxel pass.
    pub fn fuse(&mut self, camera: &CalibratedPosedCamera, depth: &DepthMap) {
        let resolution = self.resolution;
        let world_from_grid = self.world_from_grid;
        let max_truncation = self.max_truncation;
        let config = self.config;
        let camera = *camera;

        self.voxels
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, voxel)| {
                let world = world_from_grid.transform_point(Self::grid_point(index, resolution));
                if let Some(sdf) = sample_signed_distance(world, &camera, depth, max_truncation) {
                    voxel.fold(sdf, config.sample_weight, config.max_weight);
                }
            });

        self.fused_passes += 1;
    }

    /// Integrate every camera's depth map in a single voxel pass.
    ///
    /// Evaluates all cameras' contributions per voxel before moving to the
    /// next voxel, amortizing voxel traversal across cameras. The batch is
    /// sized by the true camera count; `cameras` and `depths` must be
    /// parallel slices.
    pub fn fuse_multiple(&mut self, cameras: &[CalibratedPosedCamera], depths: &[&DepthMap]) {
        assert_eq!(
            cameras.len(),
            depths.len(),
            "fuse_multiple requires one depth map per camera"
        );
        if cameras.is_empty() {
            return;
        }
        let resolution = self.resolution;
        let world_from_grid = self.world_from_grid;
        let max_truncation = self.max_truncation;
        let config = self.config;

        self.voxels
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, voxel)| {
                let world = world_from_grid.transform_point(Self::grid_point(index, resolution));
                for (camera, depth) in cameras.iter().zip(depths.iter()) {
                    if let Some(sdf) = sample_signed_distance(world, camera, depth, max_truncation)
                    {
                        voxel.fold(sdf, config.sample_weight, config.max_weight);
                    }
                }
            });

        self.fused_passes += 1;
    }

    /// Trilinear TSDF sample at a grid-space point.
    ///
    /// None outside the lattice or when any of the 8 surrounding voxels is
    /// unobserved.
    pub fn sample_distance(&self, p: Vec3) -> Option<f32> {
        let base = p.floor();
        let f = p - base;
        let (x0, y0, z0) = (base.x as i64, base.y as i64, base.z as i64);
        if x0 < 0
            || y0 < 0
            || z0 < 0
            || x0 + 1 >= self.resolution.x as i64
            || y0 + 1 >= self.resolution.y as i64
            || z0 + 1 >= self.resolution.z as i64
        {
            return None;
        }
        let (x0, y0, z0) = (x0 as u32, y0 as u32, z0 as u32);

        let mut corners = [0.0f32; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let v = &self.voxels[self.linear_index(
                x0 + (i as u32 & 1),
                y0 + ((i as u32 >> 1) & 1),
                z0 + ((i as u32 >> 2) & 1),
            )];
            if v.weight <= 0.0 {
                return None;
            }
            *corner = v.distance;
        }

        let c00 = corners[0] * (1.0 - f.x) + corners[1] * f.x;
        let c10 = corners[2] * (1.0 - f.x) + corners[3] * f.x;
        let c01 = corners[4] * (1.0 - f.x) + corners[5] * f.x;
        let c11 = corners[6] * (1.0 - f.x) + corners[7] * f.x;
        let c0 = c00 * (1.0 - f.y) + c10 * f.y;
        let c1 = c01 * (1.0 - f.y) + c11 * f.y;
        Some(c0 * (1.0 - f.z) + c1 * f.z)
    }

    /// Gradient of the distance field at a grid-space point, by central
    /// differences of trilinear samples. Components are per grid unit.
    pub fn distance_gradient(&self, p: Vec3) -> Option<Vec3> {
        const H: f32 = 0.5;
        let dx = self.sample_distance(p + Vec3::X * H)? - self.sample_distance(p - Vec3::X * H)?;
        let dy = self.sample_distance(p + Vec3::Y * H)? - self.sample_distance(p - Vec3::Y * H)?;
        let dz = self.sample_distance(p + Vec3::Z * H)? - self.sample_distance(p - Vec3::Z * H)?;
        Some(Vec3::new(dx, dy, dz) / (2.0 * H))
    }
}

/// Project a world point into a depth camera and return the clamped signed
/// distance sample, or None when the voxel is not observed by this camera.
///
/// Not observed means: behind the camera, predicted depth outside the valid
/// range, projection outside the image, an invalid depth measurement, or a
/// signed distance outside the truncation band. Distances below
/// `-max_truncation` belong to occluded space and must not be touched;
/// distances above `+max_truncation` are too far in front of the observed
/// surface to carry information about it.
#[inline]
fn sample_signed_distance(
    world: Vec3,
    camera: &CalibratedPosedCamera,
    depth: &DepthMap,
    max_truncation: f32,
) -> Option<f32> {
    let p_cam = camera.camera_from_world.transform_point3(world);
    if p_cam.z < camera.depth_min_max.x || p_cam.z > camera.depth_min_max.y {
        return None;
    }

    let u = camera.flpp.x * p_cam.x / p_cam.z + camera.flpp.z;
    let v = camera.flpp.y * p_cam.y / p_cam.z + camera.flpp.w;
    let (px, py) = (u.floor() as i32, v.floor() as i32);
    if px < 0 || py < 0 || px as usize >= depth.width() || py as usize >= depth.height() {
        return None;
    }

    let measured = depth.get(px, py);
    if !DepthMap::is_valid(measured)
        || measured < camera.depth_min_max.x
        || measured > camera.depth_min_max.y
    {
        return None;
    }

    let sdf = measured - p_cam.z;
    if sdf < -max_truncation || sdf > max_truncation {
        return None;
    }
    Some(sdf.clamp(-max_truncation, max_truncation))
}
