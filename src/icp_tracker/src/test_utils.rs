//! Synthetic scenes with known ground truth.
//!
//! The scene is the inside corner of a room: three orthogonal walls at
//! `x = 1`, `y = 1` and `z = 3` (meters), seen from a camera near the origin
//! looking along `+z`. Every frame that sees the corner constrains all six
//! pose parameters, which makes it a convenient fixture for ICP.

use nalgebra::{Rotation3, Vector3, Vector4};

use crate::camera::Intrinsics;
use crate::image::{DepthImage, PointMap};
use crate::pose::Se3Pose;
use crate::state::{PointCloud, TrackingState, View};

/// Wall planes as `(axis, offset)`: points with `p[axis] == offset`.
pub const CORNER_WALLS: [(usize, f64); 3] = [(0, 1.0), (1, 1.0), (2, 3.0)];

/// Intrinsics with a ~77° horizontal field of view for a `width x height`
/// image.
pub fn corner_intrinsics(width: usize, height: usize) -> Intrinsics {
    let f = 0.8 * width as f64;
    Intrinsics::new(f, f, width as f64 / 2.0, height as f64 / 2.0)
}

/// World-to-camera pose of a camera whose center is at `(x, y, z)` and whose
/// axes are aligned with the world axes.
pub fn translated_pose(x: f64, y: f64, z: f64) -> Se3Pose {
    Se3Pose::from_parts(&Rotation3::identity(), &Vector3::new(-x, -y, -z))
}

/// Cast the ray through pixel `(u, v)` and return the world-space hit point
/// and the wall normal (facing the camera).
pub fn cast_corner_ray(
    intrinsics: &Intrinsics,
    pose: &Se3Pose,
    u: f64,
    v: f64,
) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let center = pose.camera_center();
    let ray_cam = intrinsics.unproject(u, v, 1.0);
    let ray = pose.rotation_matrix().transpose() * ray_cam;

    let mut best: Option<(f64, usize)> = None;
    for (axis, offset) in CORNER_WALLS {
        if ray[axis].abs() < 1e-12 {
            continue;
        }
        let t = (offset - center[axis]) / ray[axis];
        if t > 0.0 && best.map_or(true, |(best_t, _)| t < best_t) {
            best = Some((t, axis));
        }
    }

    best.map(|(t, axis)| {
        let mut normal = Vector3::zeros();
        normal[axis] = -1.0;
        (center + ray * t, normal)
    })
}

/// Render the depth image seen from `pose`. Pixels that miss the walls
/// are holes (0).
pub fn render_corner_depth(
    width: usize,
    height: usize,
    intrinsics: &Intrinsics,
    pose: &Se3Pose,
) -> DepthImage {
    DepthImage::from_fn(width, height, |x, y| {
        match cast_corner_ray(intrinsics, pose, x as f64, y as f64) {
            Some((point, _)) => {
                let m = pose.m();
                let z = (m.fixed_view::<3, 3>(0, 0) * point + m.fixed_view::<3, 1>(0, 3)).z;
                z as f32
            }
            None => 0.0,
        }
    })
}

/// Render world-space point and normal maps seen from `pose`.
pub fn render_corner_point_cloud(
    width: usize,
    height: usize,
    intrinsics: &Intrinsics,
    pose: &Se3Pose,
) -> PointCloud {
    let hole = Vector4::new(0.0, 0.0, 0.0, -1.0);
    let mut locations = PointMap::new(width, height, hole);
    let mut normals = PointMap::new(width, height, hole);

    for y in 0..height {
        for x in 0..width {
            if let Some((p, n)) = cast_corner_ray(intrinsics, pose, x as f64, y as f64) {
                locations.set(x, y, Vector4::new(p.x as f32, p.y as f32, p.z as f32, 1.0));
                normals.set(x, y, Vector4::new(n.x as f32, n.y as f32, n.z as f32, 0.0));
            }
        }
    }

    PointCloud { locations, normals }
}

/// Overwrite a deterministic `fraction` of the depth samples with `value`.
///
/// Pixel `i` is overwritten when `(i * 37) % 100 < fraction * 100`, which
/// spreads the affected pixels evenly over the image.
pub fn corrupt_depth(depth: &mut DepthImage, fraction: f64, value: f32) {
    let cutoff = (fraction.clamp(0.0, 1.0) * 100.0).round() as usize;
    for (i, d) in depth.as_mut_slice().iter_mut().enumerate() {
        if (i * 37) % 100 < cutoff {
            *d = value;
        }
    }
}

/// Turn a deterministic `fraction` of the depth samples into holes.
pub fn knock_out_depth(depth: &mut DepthImage, fraction: f64) {
    corrupt_depth(depth, fraction, 0.0);
}

/// Tracking state referencing the corner rendered from `reference_pose`,
/// with the current pose initialized to `reference_pose`, and the live view
/// rendered from `live_pose`.
pub fn corner_fixture(
    width: usize,
    height: usize,
    reference_pose: &Se3Pose,
    live_pose: &Se3Pose,
) -> (TrackingState, View) {
    let intrinsics = corner_intrinsics(width, height);
    let cloud = render_corner_point_cloud(width, height, &intrinsics, reference_pose);

    let mut state = TrackingState::new(cloud);
    state.pose = *reference_pose;
    state.reference_pose = *reference_pose;

    let view = View {
        depth: render_corner_depth(width, height, &intrinsics, live_pose),
        intrinsics,
    };
    (state, view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_ray_hits_back_wall() {
        let k = corner_intrinsics(80, 60);
        let (p, n) = cast_corner_ray(&k, &Se3Pose::identity(), 40.0, 30.0).unwrap();
        assert_relative_eq!(p, Vector3::new(0.0, 0.0, 3.0), epsilon = 1e-12);
        assert_eq!(n, Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_all_three_walls_visible() {
        let k = corner_intrinsics(80, 60);
        let cloud = render_corner_point_cloud(80, 60, &k, &Se3Pose::identity());
        let mut seen = [false; 3];
        for n in cloud.normals.as_slice() {
            for axis in 0..3 {
                if n[axis] < -0.5 {
                    seen[axis] = true;
                }
            }
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[test]
    fn test_depth_matches_points() {
        let k = corner_intrinsics(32, 24);
        let pose = Se3Pose::identity();
        let depth = render_corner_depth(32, 24, &k, &pose);
        let cloud = render_corner_point_cloud(32, 24, &k, &pose);
        for y in 0..24 {
            for x in 0..32 {
                assert_relative_eq!(depth.get(x, y), cloud.locations.get(x, y).z, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_translated_camera_sees_closer_wall() {
        let k = corner_intrinsics(32, 24);
        let near = render_corner_depth(32, 24, &k, &translated_pose(0.0, 0.0, 0.5));
        assert_relative_eq!(near.get(16, 12), 2.5, epsilon = 1e-5);
    }

    #[test]
    fn test_knock_out_fraction() {
        let mut depth = DepthImage::new(100, 10, 1.0);
        knock_out_depth(&mut depth, 0.9);
        let valid = depth.as_slice().iter().filter(|&&d| d > 0.0).count();
        assert_eq!(valid, 100);

        let mut depth = DepthImage::new(100, 1, 1.0);
        corrupt_depth(&mut depth, 0.25, 9.0);
        assert_eq!(depth.as_slice().iter().filter(|&&d| d == 9.0).count(), 25);
    }
}
