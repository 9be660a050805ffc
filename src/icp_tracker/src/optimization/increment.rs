//! First-order pose increments.

use nalgebra::{Matrix4, Vector6};

use super::types::IterationType;

/// Homogeneous increment for a step in `[rx, ry, rz, tx, ty, tz]` layout.
///
/// The rotation block is `I + [ω]ₓᵀ` (not exponentiated) so that applying
/// it to `p` gives `p + p × ω + t`. Parameters outside the iteration type
/// are ignored.
pub fn increment_matrix(iteration_type: IterationType, step: &Vector6<f64>) -> Matrix4<f64> {
    let mut s = *step;
    iteration_type.mask(&mut s);
    let (rx, ry, rz) = (s[0], s[1], s[2]);
    let (tx, ty, tz) = (s[3], s[4], s[5]);

    #[rustfmt::skip]
    let inc = Matrix4::new(
        1.0,  rz, -ry, tx,
        -rz, 1.0,  rx, ty,
         ry, -rx, 1.0, tz,
        0.0, 0.0, 0.0, 1.0,
    );
    inc
}

/// Left-compose the increment onto a camera-to-world matrix.
///
/// The result is generally not rigid; callers re-normalize it.
pub fn compose_increment(
    iteration_type: IterationType,
    step: &Vector6<f64>,
    old_inv_pose: &Matrix4<f64>,
) -> Matrix4<f64> {
    increment_matrix(iteration_type, step) * old_inv_pose
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Se3Pose;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_zero_step_is_identity() {
        let inc = increment_matrix(IterationType::Both, &Vector6::zeros());
        assert_eq!(inc, Matrix4::identity());
    }

    #[test]
    fn test_translation_step() {
        let step = Vector6::new(0.0, 0.0, 0.0, 0.1, -0.2, 0.3);
        let composed = compose_increment(IterationType::Both, &step, &Matrix4::identity());
        assert_relative_eq!(
            composed.fixed_view::<3, 1>(0, 3).into_owned(),
            Vector3::new(0.1, -0.2, 0.3)
        );
    }

    #[test]
    fn test_applies_cross_product() {
        let omega = Vector3::new(0.01, -0.02, 0.03);
        let p = Vector3::new(1.0, 2.0, 3.0);
        let step = Vector6::new(omega.x, omega.y, omega.z, 0.0, 0.0, 0.0);

        let inc = increment_matrix(IterationType::Both, &step);
        let moved = inc.fixed_view::<3, 3>(0, 0) * p;

        assert_relative_eq!(moved, p + p.cross(&omega), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_only_ignores_translation() {
        let step = Vector6::new(0.0, 0.0, 0.1, 5.0, 5.0, 5.0);
        let inc = increment_matrix(IterationType::RotationOnly, &step);
        assert_eq!(inc.fixed_view::<3, 1>(0, 3).into_owned(), Vector3::zeros());

        let inc = increment_matrix(IterationType::TranslationOnly, &step);
        assert_eq!(inc.fixed_view::<3, 3>(0, 0).into_owned(), nalgebra::Matrix3::identity());
    }

    #[test]
    fn test_renormalized_composition_is_rigid() {
        let steps = [
            Vector6::new(0.001, 0.0, 0.0, 0.0, 0.0, 0.0),
            Vector6::new(0.3, -0.2, 0.5, 1.0, 2.0, 3.0),
            Vector6::new(10.0, 20.0, -30.0, 0.0, 0.0, 0.0),
            Vector6::new(1e3, -1e3, 1e3, 1e3, -1e3, 1e3),
        ];
        for step in steps {
            for iteration_type in [
                IterationType::Both,
                IterationType::RotationOnly,
                IterationType::TranslationOnly,
            ] {
                let mut pose = Se3Pose::identity();
                let composed = compose_increment(iteration_type, &step, &pose.inv_m());
                pose.set_inv_m(composed);
                pose.coerce();
                assert!(pose.is_rigid(1e-9), "{iteration_type} {step:?}");
            }
        }
    }
}
