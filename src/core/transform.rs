//! Similarity transform (uniform scale + rotation + translation)
//!
//! Maps grid-local coordinates to world coordinates: `p_world = s * R * p_grid + t`.

use glam::{Mat4, Quat, Vec3};

/// Similarity transform: uniform scale, then rotation, then translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    scale: f32,
    rotation: Quat,
    translation: Vec3,
}

impl SimilarityTransform {
    /// Create a new similarity transform.
    ///
    /// `scale` must be positive and nonzero.
    pub fn new(scale: f32, rotation: Quat, translation: Vec3) -> Self {
        assert!(scale > 0.0, "similarity transform scale must be positive");
        Self {
            scale,
            rotation: rotation.normalize(),
            translation,
        }
    }

    /// Identity transform
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
        }
    }

    /// Uniform scale followed by translation, no rotation
    pub fn from_scale_translation(scale: f32, translation: Vec3) -> Self {
        Self::new(scale, Quat::IDENTITY, translation)
    }

    /// Transform a point: `s * R * p + t`
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation * (self.scale * p) + self.translation
    }

    /// Transform a vector (scale and rotation, no translation)
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.rotation * (self.scale * v)
    }

    /// Inverse transform
    pub fn inverse(&self) -> SimilarityTransform {
        let inv_scale = 1.0 / self.scale;
        let inv_rotation = self.rotation.inverse();
        SimilarityTransform {
            scale: inv_scale,
            rotation: inv_rotation,
            translation: -(inv_rotation * self.translation) * inv_scale,
        }
    }

    /// Convert to 4x4 matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.translation,
        )
    }

    /// Get the uniform scale factor
    pub fn scale(&self) -> f32 {
        self.scale
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

impl Default for SimilarityTransform {
    fn default() -> Self {
        Self::identity()
    }
}
