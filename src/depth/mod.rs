//! Depth preprocessing
//!
//! Undistortion is a per-pixel remap: the undistorted value at pixel p is
//! sampled from the raw map at p + offset(p), where the offset map is
//! precomputed per camera at calibration time.

use glam::{UVec2, Vec2};

use crate::core::DepthMap;

/// Per-camera depth preprocessor.
#[derive(Debug, Clone, Copy)]
pub struct DepthProcessor {
    resolution: UVec2,
}

impl DepthProcessor {
    pub fn new(resolution: UVec2) -> Self {
        Self { resolution }
    }

    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    /// Remap `raw` through `offset_map` into `out`, overwriting prior contents.
    ///
    /// Source coordinates falling outside the image, or touching invalid
    /// measurements, produce 0 (no measurement). `offset_map` must hold one
    /// offset per pixel; the pipeline validates this at construction.
    pub fn undistort(&self, raw: &DepthMap, offset_map: &[Vec2], out: &mut DepthMap) {
        let (w, h) = (self.resolution.x as usize, self.resolution.y as usize);
        debug_assert_eq!(offset_map.len(), w * h);
        debug_assert_eq!(out.len(), w * h);

        for y in 0..h {
            for x in 0..w {
                let offset = offset_map[y * w + x];
                let src = Vec2::new(x as f32 + offset.x, y as f32 + offset.y);
                out.set(x, y, Self::sample(raw, src));
            }
        }
    }

    /// Bilinear depth lookup, falling back to nearest when a tap is invalid.
    fn sample(raw: &DepthMap, src: Vec2) -> f32 {
        let x0 = src.x.floor();
        let y0 = src.y.floor();
        let fx = src.x - x0;
        let fy = src.y - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);

        let d00 = raw.get(x0, y0);
        let d10 = raw.get(x0 + 1, y0);
        let d01 = raw.get(x0, y0 + 1);
        let d11 = raw.get(x0 + 1, y0 + 1);

        if DepthMap::is_valid(d00)
            && DepthMap::is_valid(d10)
            && DepthMap::is_valid(d01)
            && DepthMap::is_valid(d11)
        {
            let top = d00 * (1.0 - fx) + d10 * fx;
            let bottom = d01 * (1.0 - fx) + d11 * fx;
            return top * (1.0 - fy) + bottom * fy;
        }

        // Nearest tap; invalid reads propagate as 0.
        raw.sample_nearest(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_map(resolution: UVec2) -> DepthMap {
        let mut m = DepthMap::new(resolution);
        for y in 0..resolution.y as usize {
            for x in 0..resolution.x as usize {
                m.set(x, y, 1.0 + x as f32 * 0.1 + y as f32 * 0.01);
            }
        }
        m
    }

    #[test]
    fn test_zero_offsets_copy() {
        let res = UVec2::new(8, 6);
        let raw = ramp_map(res);
        let offsets = vec![Vec2::ZERO; 48];
        let mut out = DepthMap::new(res);

        DepthProcessor::new(res).undistort(&raw, &offsets, &mut out);
        for y in 0..6 {
            for x in 0..8 {
                assert!((out.get(x, y) - raw.get(x, y)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_constant_shift() {
        let res = UVec2::new(8, 6);
        let raw = ramp_map(res);
        let offsets = vec![Vec2::new(1.0, 0.0); 48];
        let mut out = DepthMap::new(res);

        DepthProcessor::new(res).undistort(&raw, &offsets, &mut out);
        // Pixel (2, 3) should now read what raw holds at (3, 3).
        assert!((out.get(2, 3) - raw.get(3, 3)).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_bounds_source_is_invalid() {
        let res = UVec2::new(4, 4);
        let raw = ramp_map(res);
        let offsets = vec![Vec2::new(10.0, 0.0); 16];
        let mut out = DepthMap::new(res);

        DepthProcessor::new(res).undistort(&raw, &offsets, &mut out);
        assert_eq!(out.get(0, 0), 0.0);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let res = UVec2::new(4, 4);
        let mut raw = DepthMap::new(res);
        raw.fill(2.0);
        raw.set(1, 1, 1.0);
        raw.set(2, 1, 3.0);
        let mut offsets = vec![Vec2::ZERO; 16];
        offsets[1 * 4 + 1] = Vec2::new(0.5, 0.0); // halfway between (1,1) and (2,1)
        let mut out = DepthMap::new(res);

        DepthProcessor::new(res).undistort(&raw, &offsets, &mut out);
        assert!((out.get(1, 1) - 2.0).abs() < 1e-6);
    }
}
