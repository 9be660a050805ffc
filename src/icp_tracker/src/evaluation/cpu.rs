//! CPU reference implementation of the point-to-plane evaluator.
//!
//! For every live pixel the candidate camera-to-world pose carries the
//! back-projected point into the world frame. The reference camera then
//! projects it into the level-0 reference maps, where the surface point and
//! normal are sampled bilinearly. The residual is the signed distance of the
//! live point to the reference tangent plane:
//!
//! - residual: `b = n · (q - p)`
//! - Jacobian row: `A = [n × p, n]` in the `[rx, ry, rz, tx, ty, tz]` layout
//!
//! which matches the first-order increment `p' = p + p × ω + t`.

use nalgebra::{Matrix4, Vector3, Vector6};

use crate::image::interpolate_bilinear_with_holes;

use super::types::{CorrespondenceEvaluator, Evaluation, EvaluationInput, NormalEquations};

/// Live depths at or below this value are treated as missing.
pub const MIN_VALID_DEPTH: f32 = 1e-8;

/// Apply a homogeneous rigid transform to a 3D point.
#[inline]
pub fn transform_point(m: &Matrix4<f64>, p: &Vector3<f64>) -> Vector3<f64> {
    m.fixed_view::<3, 3>(0, 0) * p + m.fixed_view::<3, 1>(0, 3)
}

/// Residual and masked Jacobian row for live pixel `(x, y)`.
///
/// Returns `None` when the pixel has no valid correspondence: missing
/// depth, projection behind the reference camera or outside the reference
/// maps, a hole in the sampled neighbourhood, or a point distance above the
/// level threshold.
pub fn compute_point_terms(
    input: &EvaluationInput<'_>,
    approx_inv_pose: &Matrix4<f64>,
    x: usize,
    y: usize,
    depth: f32,
) -> Option<(f64, Vector6<f64>)> {
    if !(depth > MIN_VALID_DEPTH) {
        return None;
    }

    let p_cam = input
        .view_intrinsics
        .unproject(x as f64, y as f64, depth as f64);
    let p = transform_point(approx_inv_pose, &p_cam);

    let reprojected = transform_point(&input.scene_pose, &p);
    let (u, v) = input.scene_intrinsics.project(&reprojected)?;
    let max_u = input.points.width() as f64 - 2.0;
    let max_v = input.points.height() as f64 - 2.0;
    if !(u >= 0.0 && u <= max_u && v >= 0.0 && v <= max_v) {
        return None;
    }

    let q = interpolate_bilinear_with_holes(input.points, u as f32, v as f32)?;
    let diff = Vector3::new(q.x as f64, q.y as f64, q.z as f64) - p;
    if diff.norm_squared() > input.dist_threshold as f64 {
        return None;
    }

    let n = interpolate_bilinear_with_holes(input.normals, u as f32, v as f32)?;
    let n = Vector3::new(n.x as f64, n.y as f64, n.z as f64);

    let b = n.dot(&diff);
    let r = n.cross(&p);
    let mut a = Vector6::new(r.x, r.y, r.z, n.x, n.y, n.z);
    input.iteration_type.mask(&mut a);

    Some((b, a))
}

/// Single-threaded evaluator, walking the live depth in row-major order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuEvaluator;

impl CpuEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl CorrespondenceEvaluator for CpuEvaluator {
    fn evaluate(&self, input: &EvaluationInput<'_>, approx_inv_pose: &Matrix4<f64>) -> Evaluation {
        let mut sums = NormalEquations::zeros();
        let width = input.depth.width();

        for (i, &depth) in input.depth.as_slice().iter().enumerate() {
            let (x, y) = (i % width, i / width);
            if let Some((b, a)) = compute_point_terms(input, approx_inv_pose, x, y, depth) {
                sums.add(b, &a);
            }
        }

        sums.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Intrinsics;
    use crate::image::DepthImage;
    use crate::optimization::IterationType;
    use crate::pose::Se3Pose;
    use crate::state::PointCloud;
    use crate::test_utils::{
        corner_intrinsics, render_corner_depth, render_corner_point_cloud, translated_pose,
    };
    use approx::assert_relative_eq;

    const W: usize = 80;
    const H: usize = 60;

    fn input<'a>(
        depth: &'a DepthImage,
        cloud: &'a PointCloud,
        k: Intrinsics,
        iteration_type: IterationType,
    ) -> EvaluationInput<'a> {
        EvaluationInput {
            depth,
            view_intrinsics: k,
            points: &cloud.locations,
            normals: &cloud.normals,
            scene_intrinsics: k,
            scene_pose: Matrix4::identity(),
            dist_threshold: 0.01,
            iteration_type,
        }
    }

    #[test]
    fn test_aligned_frames_have_zero_energy() {
        let k = corner_intrinsics(W, H);
        let cloud = render_corner_point_cloud(W, H, &k, &Se3Pose::identity());
        let depth = render_corner_depth(W, H, &k, &Se3Pose::identity());

        let eval = CpuEvaluator::new().evaluate(
            &input(&depth, &cloud, k, IterationType::Both),
            &Matrix4::identity(),
        );

        assert!(eval.valid_count > (W * H) * 9 / 10);
        assert!(eval.valid_count <= (W - 1) * (H - 1));
        assert!(eval.energy < 1e-8, "energy {}", eval.energy);
    }

    #[test]
    fn test_no_correspondences() {
        let k = corner_intrinsics(W, H);
        let cloud = PointCloud::empty(W, H);
        let depth = render_corner_depth(W, H, &k, &Se3Pose::identity());

        let eval = CpuEvaluator::new().evaluate(
            &input(&depth, &cloud, k, IterationType::Both),
            &Matrix4::identity(),
        );

        assert_eq!(eval, Evaluation::failed());
    }

    #[test]
    fn test_hessian_symmetry() {
        let k = corner_intrinsics(W, H);
        let cloud = render_corner_point_cloud(W, H, &k, &Se3Pose::identity());
        let depth = render_corner_depth(W, H, &k, &translated_pose(0.01, -0.01, 0.02));

        let eval = CpuEvaluator::new().evaluate(
            &input(&depth, &cloud, k, IterationType::Both),
            &Matrix4::identity(),
        );

        assert!(eval.valid_count > 0);
        for i in 0..6 {
            for j in 0..6 {
                assert_relative_eq!(eval.hessian[(i, j)], eval.hessian[(j, i)], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_rotation_only_masks_translation() {
        let k = corner_intrinsics(W, H);
        let cloud = render_corner_point_cloud(W, H, &k, &Se3Pose::identity());
        let depth = render_corner_depth(W, H, &k, &translated_pose(0.02, 0.0, 0.0));

        let eval = CpuEvaluator::new().evaluate(
            &input(&depth, &cloud, k, IterationType::RotationOnly),
            &Matrix4::identity(),
        );

        assert!(eval.valid_count > 0);
        for i in 3..6 {
            assert_eq!(eval.gradient[i], 0.0);
            for j in 0..6 {
                assert_eq!(eval.hessian[(i, j)], 0.0);
                assert_eq!(eval.hessian[(j, i)], 0.0);
            }
        }
    }

    #[test]
    fn test_gauss_newton_step_points_towards_true_pose() {
        let k = corner_intrinsics(W, H);
        let cloud = render_corner_point_cloud(W, H, &k, &Se3Pose::identity());
        // Live camera sits 2 cm further along +x than the current estimate.
        let depth = render_corner_depth(W, H, &k, &translated_pose(0.02, 0.0, 0.0));

        let eval = CpuEvaluator::new().evaluate(
            &input(&depth, &cloud, k, IterationType::TranslationOnly),
            &Matrix4::identity(),
        );
        let h = eval.hessian.fixed_view::<3, 3>(3, 3).into_owned();
        let g = eval.gradient.fixed_rows::<3>(3).into_owned();
        let step = h.cholesky().unwrap().solve(&g);

        assert_relative_eq!(step.x, 0.02, epsilon = 0.005);
        assert!(step.y.abs() < 0.005);
        assert!(step.z.abs() < 0.005);
    }

    #[test]
    fn test_distance_threshold_rejects_far_points() {
        let k = corner_intrinsics(W, H);
        let cloud = render_corner_point_cloud(W, H, &k, &Se3Pose::identity());
        let depth = render_corner_depth(W, H, &k, &translated_pose(0.2, 0.2, 0.2));

        let mut tight = input(&depth, &cloud, k, IterationType::Both);
        tight.dist_threshold = 0.001;
        let eval = CpuEvaluator::new().evaluate(&tight, &Matrix4::identity());

        assert_eq!(eval.valid_count, 0);
    }
}
