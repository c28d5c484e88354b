//! SE(3) pose representation using glam
//!
//! Rigid pose (rotation + translation) used for camera extrinsics and
//! virtual viewpoints. All operations use f32 for performance with glam.

use glam::{Mat4, Quat, Vec3};

/// SE3 pose: rotation followed by translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    /// Rotation as quaternion
    rotation: Quat,
    /// Translation vector
    translation: Vec3,
}

impl SE3 {
    /// Create a new SE3 from rotation and translation
    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation: rotation.normalize(),
            translation,
        }
    }

    /// Create identity pose
    pub fn identity() -> Self {
        Self {
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
        }
    }

    /// Create from axis-angle rotation and translation
    pub fn from_axis_angle(axis: Vec3, angle: f32, translation: Vec3) -> Self {
        let axis = if axis.length() > 1e-10 {
            axis.normalize()
        } else {
            Vec3::X
        };
        Self {
            rotation: Quat::from_axis_angle(axis, angle),
            translation,
        }
    }

    /// Compose two poses: self * other
    pub fn compose(&self, other: &SE3) -> SE3 {
        SE3 {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * other.translation,
        }
    }

    /// Inverse of the pose
    pub fn inverse(&self) -> SE3 {
        let rotation = self.rotation.inverse();
        SE3 {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Transform a 3D point
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// Transform a 3D vector (direction, no translation)
    pub fn transform_vector(&self, vec: Vec3) -> Vec3 {
        self.rotation * vec
    }

    /// Convert to 4x4 transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// Get the rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Get the translation
    pub fn translation(&self) -> Vec3 {
        self.translation
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}
