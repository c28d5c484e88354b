//! Camera models: intrinsics, per-camera RGBD parameters, virtual viewpoints
//! and the compact per-camera record used by batched fusion.

use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

use crate::core::SE3;

/// Pinhole intrinsics: focal length and principal point, in pixels.
///
/// The camera looks down +Z; a camera-space point projects to
/// `u = fx * x / z + cx`, `v = fy * y / z + cy`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    /// Focal length (fx, fy)
    pub focal: Vec2,
    /// Principal point (cx, cy)
    pub principal: Vec2,
}

impl Intrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self {
            focal: Vec2::new(fx, fy),
            principal: Vec2::new(cx, cy),
        }
    }

    /// Packed focal-length + principal-point vector (fx, fy, cx, cy).
    ///
    /// This is the layout the fusion and raycast kernels consume.
    pub fn flpp(&self) -> Vec4 {
        Vec4::new(self.focal.x, self.focal.y, self.principal.x, self.principal.y)
    }

    /// Project a camera-space point to (u, v, depth).
    ///
    /// Returns None for points at or behind the camera plane.
    pub fn project(&self, point: Vec3) -> Option<Vec3> {
        if point.z <= 0.0 {
            return None;
        }
        Some(Vec3::new(
            self.focal.x * point.x / point.z + self.principal.x,
            self.focal.y * point.y / point.z + self.principal.y,
            point.z,
        ))
    }

    /// Unproject pixel coordinates at a given depth to a camera-space point.
    pub fn unproject(&self, pixel: Vec2, depth: f32) -> Vec3 {
        Vec3::new(
            (pixel.x - self.principal.x) / self.focal.x * depth,
            (pixel.y - self.principal.y) / self.focal.y * depth,
            depth,
        )
    }

    /// Rescale intrinsics from one image resolution to another.
    pub fn rescaled(&self, from: UVec2, to: UVec2) -> Intrinsics {
        let s = to.as_vec2() / from.as_vec2();
        Intrinsics {
            focal: self.focal * s,
            principal: self.principal * s,
        }
    }
}

/// Per-camera calibration: resolutions, depth intrinsics, valid depth range,
/// undistortion map and extrinsic pose. Set once at construction, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbdCameraParameters {
    /// Color stream resolution (width, height)
    pub color_resolution: UVec2,
    /// Depth stream resolution (width, height)
    pub depth_resolution: UVec2,
    /// Depth stream intrinsics
    pub depth_intrinsics: Intrinsics,
    /// Valid depth range [min, max] in meters
    pub depth_range: Vec2,
    /// Per-pixel undistortion offsets, row-major, depth-resolution sized.
    /// The undistorted value at pixel p is read from the raw map at p + offset.
    pub undistort_map: Vec<Vec2>,
    /// Depth extrinsic pose (camera-from-world)
    pub camera_from_world: SE3,
}

impl RgbdCameraParameters {
    /// Number of pixels in one depth frame
    pub fn num_depth_pixels(&self) -> usize {
        (self.depth_resolution.x * self.depth_resolution.y) as usize
    }

    /// An all-zero undistortion map for the given resolution (identity remap)
    pub fn identity_undistort_map(resolution: UVec2) -> Vec<Vec2> {
        vec![Vec2::ZERO; (resolution.x * resolution.y) as usize]
    }
}

/// A posed perspective camera used as a virtual viewpoint for raycasting
/// and to describe a physical depth camera's frustum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    /// Extrinsic pose (camera-from-world)
    pub camera_from_world: SE3,
    /// Intrinsics at `resolution`
    pub intrinsics: Intrinsics,
    /// Native image resolution (width, height)
    pub resolution: UVec2,
    /// Near plane distance
    pub z_near: f32,
    /// Far plane distance
    pub z_far: f32,
}

impl PerspectiveCamera {
    /// The inverse extrinsic pose (world-from-camera)
    pub fn world_from_camera(&self) -> SE3 {
        self.camera_from_world.inverse()
    }

    /// Intrinsics rescaled to a target output resolution
    pub fn intrinsics_for(&self, resolution: UVec2) -> Intrinsics {
        self.intrinsics.rescaled(self.resolution, resolution)
    }

    /// World-space ray through the center of pixel (x, y): origin and unit
    /// direction. Raycasting marches these rays through the grid.
    pub fn pixel_ray(&self, x: u32, y: u32) -> (Vec3, Vec3) {
        let world_from_camera = self.world_from_camera();
        let dir_cam = self
            .intrinsics
            .unproject(Vec2::new(x as f32 + 0.5, y as f32 + 0.5), 1.0);
        (
            world_from_camera.translation(),
            world_from_camera.transform_vector(dir_cam).normalize(),
        )
    }
}

/// Compact per-camera record consumed by the batched fusion kernel.
///
/// Built fresh from [`RgbdCameraParameters`] on every `fuse`/`fuse_multiple`
/// call; purely transient, never persisted.
#[derive(Debug, Clone, Copy)]
pub struct CalibratedPosedCamera {
    /// Packed focal length + principal point (fx, fy, cx, cy)
    pub flpp: Vec4,
    /// Valid depth range (min, max) in meters
    pub depth_min_max: Vec2,
    /// Camera-from-world transform
    pub camera_from_world: Mat4,
}

impl CalibratedPosedCamera {
    pub fn from_parameters(params: &RgbdCameraParameters) -> Self {
        Self {
            flpp: params.depth_intrinsics.flpp(),
            depth_min_max: params.depth_range,
            camera_from_world: params.camera_from_world.to_matrix(),
        }
    }
}
