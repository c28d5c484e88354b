//! Raycasting through the TSDF
//!
//! Marches a ray per output pixel through the grid and reports the first
//! positive-to-negative zero crossing of the distance field as a surface
//! hit. Two marching strategies share the crossing and normal rules: a
//! constant half-voxel step, and an adaptive step that uses the sampled
//! distance magnitude to skip empty space.
//!
//! Hit encoding: a hit pixel stores `(x, y, z, 1)` in the position buffer
//! and `(nx, ny, nz, 0)` in the normal buffer; a miss stores `Vec4::ZERO`
//! in both. Test `position.w != 0` for validity.

use glam::{Mat3, Mat4, UVec2, Vec3, Vec4};
use rayon::prelude::*;

use crate::fusion::TsdfVolume;

/// Marching strategy, chosen explicitly per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaycastMode {
    /// Constant half-voxel step
    FixedStep,
    /// Step modulated by the sampled distance magnitude (empty-space skipping)
    Adaptive,
}

/// Pixel-aligned world-space position and normal buffers.
#[derive(Debug, Clone)]
pub struct RaycastOutput {
    width: usize,
    height: usize,
    /// World-space hit positions, `w == 1` when valid
    pub world_points: Vec<Vec4>,
    /// World-space unit surface normals, `w == 0`; zero vector on miss
    pub world_normals: Vec<Vec4>,
}

impl RaycastOutput {
    pub fn new(resolution: UVec2) -> Self {
        let (width, height) = (resolution.x as usize, resolution.y as usize);
        Self {
            width,
            height,
            world_points: vec![Vec4::ZERO; width * height],
            world_normals: vec![Vec4::ZERO; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether the pixel at (x, y) recorded a surface hit.
    pub fn is_hit(&self, x: usize, y: usize) -> bool {
        self.world_points[y * self.width + x].w != 0.0
    }

    pub fn point(&self, x: usize, y: usize) -> Vec4 {
        self.world_points[y * self.width + x]
    }

    pub fn normal(&self, x: usize, y: usize) -> Vec4 {
        self.world_normals[y * self.width + x]
    }
}

/// Grid-space ray march state shared by both modes.
struct Marcher<'a> {
    volume: &'a TsdfVolume,
    mode: RaycastMode,
    /// World units per grid unit
    scale: f32,
}

const FIXED_STEP: f32 = 0.5;
const MIN_ADAPTIVE_STEP: f32 = 0.25;
/// Safety factor applied to the distance bound when skipping empty space.
const ADAPTIVE_GAIN: f32 = 0.9;

impl<'a> Marcher<'a> {
    /// March from `origin` along unit `dir` (both grid space) and return the
    /// refined hit point and grid-space normal direction.
    fn march(&self, origin: Vec3, dir: Vec3) -> Option<(Vec3, Vec3)> {
        let extent = (self.volume.resolution - glam::UVec3::ONE).as_vec3();
        let (t_entry, t_exit) = clip_to_box(origin, dir, extent)?;

        let mut t = t_entry.max(0.0);
        let mut prev: Option<(f32, f32)> = None;
        while t <= t_exit {
            let p = origin + dir * t;
            match self.volume.sample_distance(p) {
                Some(d) => {
                    if let Some((t_prev, d_prev)) = prev {
                        if d_prev > 0.0 && d <= 0.0 {
                            let t_hit = t_prev + (t - t_prev) * d_prev / (d_prev - d);
                            let hit = origin + dir * t_hit;
                            let normal = self
                                .volume
                                .distance_gradient(hit)
                                .or_else(|| self.volume.distance_gradient(origin + dir * t_prev))?;
                            return Some((hit, normal));
                        }
                    }
                    prev = Some((t, d));
                    t += self.step_for(d);
                }
                None => {
                    // Unknown space: restart crossing detection.
                    prev = None;
                    t += FIXED_STEP;
                }
            }
        }
        None
    }

    fn step_for(&self, distance: f32) -> f32 {
        match self.mode {
            RaycastMode::FixedStep => FIXED_STEP,
            RaycastMode::Adaptive => {
                // The surface is at least |distance| away, so stepping a
                // fraction of that in grid units is safe.
                let bound = distance.abs() / self.scale;
                (bound * ADAPTIVE_GAIN).max(MIN_ADAPTIVE_STEP)
            }
        }
    }
}

/// Slab clip of a ray against the grid-space box [0, extent].
fn clip_to_box(origin: Vec3, dir: Vec3, extent: Vec3) -> Option<(f32, f32)> {
    let mut t_min = 0.0f32;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        if d.abs() < 1e-9 {
            if o < 0.0 || o > extent[axis] {
                return None;
            }
            continue;
        }
        let t0 = (0.0 - o) / d;
        let t1 = (extent[axis] - o) / d;
        let (lo, hi) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
        t_min = t_min.max(lo);
        t_max = t_max.min(hi);
        if t_min > t_max {
            return None;
        }
    }
    Some((t_min, t_max))
}

impl TsdfVolume {
    /// Raycast the grid from a virtual camera, one worker per output pixel.
    ///
    /// `flpp` packs the camera intrinsics (fx, fy, cx, cy) at the output
    /// resolution; `world_from_camera` places the camera in the world. The
    /// grid is read-only throughout.
    pub fn raycast(
        &self,
        flpp: Vec4,
        world_from_camera: Mat4,
        mode: RaycastMode,
        out: &mut RaycastOutput,
    ) {
        if out.world_points.is_empty() {
            return;
        }
        let width = out.width;
        let origin_world = world_from_camera.transform_point3(Vec3::ZERO);
        let rotation_world = Mat3::from_mat4(world_from_camera);
        let grid_from_world = self.grid_from_world;
        let origin_grid = grid_from_world.transform_point(origin_world);
        let marcher = Marcher {
            volume: self,
            mode,
            scale: self.world_from_grid.scale(),
        };
        let world_from_grid = self.world_from_grid;

        out.world_points
            .par_chunks_mut(width)
            .zip(out.world_normals.par_chunks_mut(width))
            .enumerate()
            .for_each(|(y, (point_row, normal_row))| {
                for x in 0..width {
                    let dir_cam = Vec3::new(
                        (x as f32 + 0.5 - flpp.z) / flpp.x,
                        (y as f32 + 0.5 - flpp.w) / flpp.y,
                        1.0,
                    );
                    let dir_world = (rotation_world * dir_cam).normalize();
                    let dir_grid = grid_from_world.transform_vector(dir_world).normalize();

                    match marcher.march(origin_grid, dir_grid) {
                        Some((hit_grid, normal_grid)) => {
                            let hit = world_from_grid.transform_point(hit_grid);
                            // Uniform scale preserves direction; rotate only.
                            let normal =
                                (world_from_grid.rotation() * normal_grid).normalize();
                            point_row[x] = hit.extend(1.0);
                            normal_row[x] = normal.extend(0.0);
                        }
                        None => {
                            point_row[x] = Vec4::ZERO;
                            normal_row[x] = Vec4::ZERO;
                        }
                    }
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SE3;
    use crate::test_utils::{
        plane_depth_map as plane_depth, plane_test_camera as test_camera,
        plane_test_volume as test_volume,
    };
    use glam::Quat;

    fn fused_plane_volume() -> TsdfVolume {
        let mut volume = test_volume();
        let camera = test_camera(SE3::identity());
        let depth = plane_depth(2.0);
        // A few passes to fill the truncation band solidly.
        for _ in 0..3 {
            volume.fuse(&camera, &depth);
        }
        volume
    }

    fn view_flpp() -> Vec4 {
        // 32x32 view, fx = fy = 32, principal point centered.
        Vec4::new(32.0, 32.0, 16.0, 16.0)
    }

    #[test]
    fn test_plane_hit_accuracy_fixed() {
        plane_hit_accuracy(RaycastMode::FixedStep);
    }

    #[test]
    fn test_plane_hit_accuracy_adaptive() {
        plane_hit_accuracy(RaycastMode::Adaptive);
    }

    fn plane_hit_accuracy(mode: RaycastMode) {
        let volume = fused_plane_volume();
        let mut out = RaycastOutput::new(glam::UVec2::new(32, 32));
        volume.raycast(view_flpp(), Mat4::IDENTITY, mode, &mut out);

        // Center pixel: ray straight down +z, plane at z = 2.
        assert!(out.is_hit(16, 16));
        let p = out.point(16, 16);
        assert!((p.z - 2.0).abs() < 0.05, "hit z = {}", p.z);
        assert!(p.x.abs() < 0.05 && p.y.abs() < 0.05);

        let n = out.normal(16, 16);
        // Plane normal faces the camera (-z).
        assert!(n.z < -0.95, "normal = {n:?}");
        assert!((n.truncate().length() - 1.0).abs() < 1e-3);

        // Off-center hits still land on the plane.
        assert!(out.is_hit(8, 24));
        assert!((out.point(8, 24).z - 2.0).abs() < 0.08);
    }

    #[test]
    fn test_modes_agree_on_hits() {
        let volume = fused_plane_volume();
        let mut fixed = RaycastOutput::new(glam::UVec2::new(32, 32));
        let mut adaptive = RaycastOutput::new(glam::UVec2::new(32, 32));
        volume.raycast(view_flpp(), Mat4::IDENTITY, RaycastMode::FixedStep, &mut fixed);
        volume.raycast(view_flpp(), Mat4::IDENTITY, RaycastMode::Adaptive, &mut adaptive);

        for y in (0..32).step_by(4) {
            for x in (0..32).step_by(4) {
                if fixed.is_hit(x, y) && adaptive.is_hit(x, y) {
                    let d = (fixed.point(x, y) - adaptive.point(x, y)).truncate().length();
                    assert!(d < 0.1, "modes disagree at ({x},{y}) by {d}");
                }
            }
        }
    }

    #[test]
    fn test_ray_away_from_grid_misses() {
        let volume = fused_plane_volume();
        let mut out = RaycastOutput::new(glam::UVec2::new(8, 8));
        // Camera flipped to look down -z: every ray leaves the grid.
        let away = Mat4::from_quat(Quat::from_axis_angle(Vec3::X, std::f32::consts::PI));
        volume.raycast(
            Vec4::new(8.0, 8.0, 4.0, 4.0),
            away,
            RaycastMode::FixedStep,
            &mut out,
        );
        for y in 0..8 {
            for x in 0..8 {
                assert!(!out.is_hit(x, y));
                assert_eq!(out.point(x, y), Vec4::ZERO);
                assert_eq!(out.normal(x, y), Vec4::ZERO);
            }
        }
    }

    #[test]
    fn test_hits_lie_on_pixel_rays() {
        use crate::core::{Intrinsics, PerspectiveCamera};

        let volume = fused_plane_volume();
        let view = PerspectiveCamera {
            camera_from_world: SE3::identity(),
            intrinsics: Intrinsics::new(32.0, 32.0, 16.0, 16.0),
            resolution: glam::UVec2::new(32, 32),
            z_near: 0.1,
            z_far: 10.0,
        };
        let mut out = RaycastOutput::new(view.resolution);
        volume.raycast(
            view.intrinsics.flpp(),
            Mat4::IDENTITY,
            RaycastMode::FixedStep,
            &mut out,
        );

        // Every hit sits on the ray the camera generates for that pixel.
        for &(x, y) in &[(16u32, 16u32), (10, 20), (22, 12)] {
            assert!(out.is_hit(x as usize, y as usize));
            let (origin, dir) = view.pixel_ray(x, y);
            let hit = out.point(x as usize, y as usize).truncate();
            let along = (hit - origin).dot(dir);
            assert!((origin + dir * along).distance(hit) < 0.03);
        }
    }

    #[test]
    fn test_zero_sized_output_is_noop() {
        let volume = fused_plane_volume();
        for resolution in [glam::UVec2::new(0, 4), glam::UVec2::new(4, 0)] {
            let mut out = RaycastOutput::new(resolution);
            volume.raycast(view_flpp(), Mat4::IDENTITY, RaycastMode::FixedStep, &mut out);
            assert!(out.world_points.is_empty());
            assert!(out.world_normals.is_empty());
        }
    }

    #[test]
    fn test_empty_grid_all_miss() {
        let volume = test_volume();
        let mut out = RaycastOutput::new(glam::UVec2::new(16, 16));
        volume.raycast(view_flpp(), Mat4::IDENTITY, RaycastMode::Adaptive, &mut out);
        for y in 0..16 {
            for x in 0..16 {
                assert!(!out.is_hit(x, y));
            }
        }
    }

    #[test]
    fn test_clip_to_box() {
        let extent = Vec3::splat(10.0);
        // Ray entering the box from outside.
        let hit = clip_to_box(Vec3::new(-5.0, 5.0, 5.0), Vec3::X, extent);
        let (t0, t1) = hit.unwrap();
        assert!((t0 - 5.0).abs() < 1e-5);
        assert!((t1 - 15.0).abs() < 1e-5);

        // Ray pointing away misses.
        assert!(clip_to_box(Vec3::new(-5.0, 5.0, 5.0), -Vec3::X, extent).is_none());

        // Parallel ray outside a slab misses.
        assert!(clip_to_box(Vec3::new(-5.0, 5.0, 5.0), Vec3::Y, extent).is_none());
    }
}
