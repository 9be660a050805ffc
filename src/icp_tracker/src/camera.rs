//! Pinhole intrinsics for depth cameras.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Pinhole projection parameters in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Intrinsics for an image with half the resolution.
    ///
    /// All four parameters are scaled by 0.5, matching the 2x2 block
    /// subsampling used for the depth pyramid.
    pub fn halved(&self) -> Self {
        Self {
            fx: self.fx * 0.5,
            fy: self.fy * 0.5,
            cx: self.cx * 0.5,
            cy: self.cy * 0.5,
        }
    }

    /// Back-project pixel `(x, y)` at the given depth into camera coordinates.
    #[inline]
    pub fn unproject(&self, x: f64, y: f64, depth: f64) -> Vector3<f64> {
        Vector3::new(
            depth * ((x - self.cx) / self.fx),
            depth * ((y - self.cy) / self.fy),
            depth,
        )
    }

    /// Project a camera-frame point to pixel coordinates.
    ///
    /// Returns `None` for points on or behind the image plane.
    #[inline]
    pub fn project(&self, point: &Vector3<f64>) -> Option<(f64, f64)> {
        if point.z <= 0.0 {
            return None;
        }
        Some((
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_project_unproject_roundtrip() {
        let k = Intrinsics::new(525.0, 520.0, 319.5, 239.5);
        let p = k.unproject(100.0, 50.0, 2.0);
        let (u, v) = k.project(&p).unwrap();
        assert_relative_eq!(u, 100.0, epsilon = 1e-9);
        assert_relative_eq!(v, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_project_behind_camera() {
        let k = Intrinsics::new(500.0, 500.0, 320.0, 240.0);
        assert!(k.project(&Vector3::new(0.0, 0.0, 0.0)).is_none());
        assert!(k.project(&Vector3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn test_halved() {
        let k = Intrinsics::new(500.0, 480.0, 320.0, 240.0).halved();
        assert_eq!(k, Intrinsics::new(250.0, 240.0, 160.0, 120.0));
    }
}
