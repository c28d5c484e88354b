//! End-to-end reconstruction of a synthetic planar scene: ingest depth,
//! fuse, raycast from a virtual viewpoint, triangulate, reset.

use glam::{Mat3, Mat4, Quat, UVec2, UVec3, Vec3, Vec4};
use rustfusion::test_utils::plane_test_parameters;
use rustfusion::{
    FusionConfig, MultiCameraPipeline, PerspectiveCamera, RaycastMode, RaycastOutput,
    SimilarityTransform, SE3,
};

const WALL_DEPTH: f32 = 2.0;

fn wall_pipeline() -> MultiCameraPipeline {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut pipeline = MultiCameraPipeline::new(
        vec![plane_test_parameters(SE3::identity())],
        UVec3::splat(17),
        SimilarityTransform::from_scale_translation(0.25, Vec3::new(-2.0, -2.0, 0.5)),
        0.75,
        FusionConfig::default(),
    )
    .unwrap();

    let frame = vec![WALL_DEPTH; 64 * 64];
    pipeline.notify_input_updated(0, &frame).unwrap();
    pipeline
}

fn front_view() -> PerspectiveCamera {
    PerspectiveCamera {
        camera_from_world: SE3::identity(),
        intrinsics: rustfusion::Intrinsics::new(32.0, 32.0, 16.0, 16.0),
        resolution: UVec2::new(32, 32),
        z_near: 0.1,
        z_far: 10.0,
    }
}

#[test]
fn single_camera_wall_reconstruction() {
    let mut pipeline = wall_pipeline();
    pipeline.fuse();

    // The voxel layer nearest the wall carries a near-zero distance.
    let volume = pipeline.volume();
    let on_wall = volume.voxel(8, 8, 6).unwrap();
    assert!(on_wall.weight > 0.0);
    assert!(on_wall.distance.abs() < 0.25 * 0.5);

    // Voxels far outside the truncation band stay unobserved.
    assert_eq!(volume.voxel(8, 8, 0).unwrap().weight, 0.0);
    assert_eq!(volume.voxel(8, 8, 16).unwrap().weight, 0.0);
}

#[test]
fn fuse_and_fuse_multiple_agree_through_pipeline() {
    let mut sequential = wall_pipeline();
    let mut batched = wall_pipeline();
    sequential.fuse();
    batched.fuse_multiple();

    let a = sequential.volume();
    let b = batched.volume();
    let res = a.resolution();
    for z in 0..res.z {
        for y in 0..res.y {
            for x in 0..res.x {
                let va = a.voxel(x, y, z).unwrap();
                let vb = b.voxel(x, y, z).unwrap();
                assert!((va.distance - vb.distance).abs() < 1e-5);
                assert!((va.weight - vb.weight).abs() < 1e-5);
            }
        }
    }
}

#[test]
fn raycast_hits_wall_and_misses_outside() {
    let mut pipeline = wall_pipeline();
    // Several passes so the truncation band is densely observed.
    for _ in 0..3 {
        pipeline.fuse();
    }

    let mut out = RaycastOutput::new(UVec2::new(32, 32));
    pipeline.raycast(&front_view(), RaycastMode::FixedStep, &mut out);

    assert!(out.is_hit(16, 16));
    let p = out.point(16, 16);
    assert!((p.z - WALL_DEPTH).abs() < 0.05);
    let n = out.normal(16, 16);
    assert!(n.z < -0.95);

    // A camera facing away from the grid sees nothing.
    let away = PerspectiveCamera {
        camera_from_world: SE3::new(Quat::from_axis_angle(Vec3::X, std::f32::consts::PI), Vec3::ZERO),
        ..front_view()
    };
    let mut miss = RaycastOutput::new(UVec2::new(16, 16));
    pipeline.raycast(&away, RaycastMode::Adaptive, &mut miss);
    for y in 0..16 {
        for x in 0..16 {
            assert!(!miss.is_hit(x, y));
            assert_eq!(miss.point(x, y), Vec4::ZERO);
        }
    }
}

#[test]
fn triangulate_applies_output_transform() {
    let mut pipeline = wall_pipeline();
    pipeline.fuse();

    let identity_mesh = pipeline.triangulate(Mat4::IDENTITY);
    assert!(!identity_mesh.is_empty());
    for p in &identity_mesh.positions {
        assert!((p.z - WALL_DEPTH).abs() < 0.02);
    }

    let rotation = Quat::from_axis_angle(Vec3::Z, 0.5);
    let output_from_world = Mat4::from_rotation_translation(rotation, Vec3::new(1.0, -2.0, 0.3));
    let transformed = pipeline.triangulate(output_from_world);
    assert_eq!(transformed.positions.len(), identity_mesh.positions.len());

    let rot = Mat3::from_quat(rotation);
    for i in 0..identity_mesh.positions.len() {
        let expect_p = output_from_world.transform_point3(identity_mesh.positions[i]);
        assert!(transformed.positions[i].distance(expect_p) < 1e-4);

        let expect_n = (rot * identity_mesh.normals[i]).normalize();
        assert!(transformed.normals[i].distance(expect_n) < 1e-3);
    }
}

#[test]
fn reset_returns_grid_to_empty() {
    let mut pipeline = wall_pipeline();
    pipeline.fuse_multiple();
    assert!(!pipeline.volume().is_empty());
    assert!(!pipeline.triangulate(Mat4::IDENTITY).is_empty());

    pipeline.reset();
    assert!(pipeline.volume().is_empty());

    // Queries on an empty grid degrade gracefully, never fail.
    assert!(pipeline.triangulate(Mat4::IDENTITY).is_empty());
    let mut out = RaycastOutput::new(UVec2::new(8, 8));
    pipeline.raycast(&front_view(), RaycastMode::Adaptive, &mut out);
    for y in 0..8 {
        for x in 0..8 {
            assert!(!out.is_hit(x, y));
        }
    }

    // Fusion after reset works again.
    pipeline.fuse();
    assert!(!pipeline.volume().is_empty());
}

#[test]
fn two_camera_fusion_extends_coverage() {
    let second = plane_test_parameters(SE3::new(Quat::IDENTITY, Vec3::new(0.0, 0.0, 1.0)));
    let mut pipeline = MultiCameraPipeline::new(
        vec![plane_test_parameters(SE3::identity()), second],
        UVec3::splat(17),
        SimilarityTransform::from_scale_translation(0.25, Vec3::new(-2.0, -2.0, 0.5)),
        0.75,
        FusionConfig::default(),
    )
    .unwrap();

    // Camera 0 sees the wall at 2.0; camera 1 sits one unit behind the
    // world origin and sees the same wall at 3.0.
    pipeline.notify_input_updated(0, &vec![2.0f32; 64 * 64]).unwrap();
    pipeline.notify_input_updated(1, &vec![3.0f32; 64 * 64]).unwrap();
    pipeline.fuse_multiple();

    // Both cameras agree on the wall position, so the estimate stays sharp.
    let on_wall = pipeline.volume().voxel(8, 8, 6).unwrap();
    assert!(on_wall.distance.abs() < 1e-3);
    assert!(on_wall.weight >= 2.0 * FusionConfig::default().sample_weight - 1e-5);
}
