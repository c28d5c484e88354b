//! Synthetic scenes for tests and examples
//!
//! A flat wall observed by a pinhole depth camera: the smallest scene with
//! a known analytic surface, used to exercise fusion, raycasting and
//! triangulation end to end.

use glam::{UVec2, UVec3, Vec2, Vec3};

use crate::config::FusionConfig;
use crate::core::{
    CalibratedPosedCamera, DepthMap, Intrinsics, RgbdCameraParameters, SE3, SimilarityTransform,
};
use crate::fusion::TsdfVolume;

/// Grid of 17^3 voxels, 0.25 world units apart, spanning x and y in
/// [-2, 2] and z in [0.5, 4.5].
pub fn plane_test_volume() -> TsdfVolume {
    TsdfVolume::new(
        UVec3::splat(17),
        SimilarityTransform::from_scale_translation(0.25, Vec3::new(-2.0, -2.0, 0.5)),
        0.75,
        FusionConfig::default(),
    )
}

/// Calibration for a 64x64 depth camera with a centered principal point.
pub fn plane_test_parameters(camera_from_world: SE3) -> RgbdCameraParameters {
    let resolution = UVec2::new(64, 64);
    RgbdCameraParameters {
        color_resolution: resolution,
        depth_resolution: resolution,
        depth_intrinsics: Intrinsics::new(50.0, 50.0, 32.0, 32.0),
        depth_range: Vec2::new(0.1, 10.0),
        undistort_map: RgbdCameraParameters::identity_undistort_map(resolution),
        camera_from_world,
    }
}

/// Fusion-batch record for [`plane_test_parameters`].
pub fn plane_test_camera(camera_from_world: SE3) -> CalibratedPosedCamera {
    CalibratedPosedCamera::from_parameters(&plane_test_parameters(camera_from_world))
}

/// A 64x64 depth map observing a fronto-parallel wall at the given depth.
pub fn plane_depth_map(depth: f32) -> DepthMap {
    let mut m = DepthMap::new(UVec2::new(64, 64));
    m.fill(depth);
    m
}
