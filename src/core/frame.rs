//! Per-camera depth buffers
//!
//! A [`DepthMap`] is one float per pixel in meters; zero or non-finite
//! values mean "no measurement". A [`DepthFrame`] pairs the raw buffer
//! (overwritten by the caller between frames) with the undistorted buffer
//! derived from it by the depth preprocessor.

use glam::{UVec2, Vec2};

/// A row-major single-channel depth image, in meters.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthMap {
    /// Create a depth map filled with zeros (no measurements).
    pub fn new(resolution: UVec2) -> Self {
        let (width, height) = (resolution.x as usize, resolution.y as usize);
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Depth at integer pixel coordinates; 0.0 outside the image.
    pub fn get(&self, x: i32, y: i32) -> f32 {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return 0.0;
        }
        self.data[y as usize * self.width + x as usize]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Whether a stored value is a usable measurement.
    pub fn is_valid(value: f32) -> bool {
        value.is_finite() && value > 0.0
    }

    /// Nearest-pixel depth at continuous image coordinates.
    ///
    /// Returns 0.0 when the nearest pixel lies outside the image or holds
    /// an invalid measurement.
    pub fn sample_nearest(&self, p: Vec2) -> f32 {
        let value = self.get(p.x.round() as i32, p.y.round() as i32);
        if Self::is_valid(value) {
            value
        } else {
            0.0
        }
    }

    /// Overwrite the whole buffer from a caller-supplied slice.
    ///
    /// The slice length must equal `len()`.
    pub fn copy_from_slice(&mut self, src: &[f32]) {
        self.data.copy_from_slice(src);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Set every pixel to the same depth (test scaffolding for synthetic planes).
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }
}

/// Raw and undistorted depth buffers for one camera.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    /// Raw depth as delivered by the capture collaborator
    pub raw: DepthMap,
    /// Undistorted depth derived by the preprocessor
    pub undistorted: DepthMap,
}

impl DepthFrame {
    pub fn new(resolution: UVec2) -> Self {
        Self {
            raw: DepthMap::new(resolution),
            undistorted: DepthMap::new(resolution),
        }
    }
}
