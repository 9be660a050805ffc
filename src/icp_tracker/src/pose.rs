//! Rigid camera pose with in-place manifold re-normalization.
//!
//! The pose stores the world-to-camera matrix `M`. The tracker optimizes the
//! inverse (camera-to-world) matrix, composes first-order increments onto it,
//! writes it back with [`Se3Pose::set_inv_m`] and then calls
//! [`Se3Pose::coerce`] to project the result back onto SE(3).

use nalgebra::{Isometry3, Matrix3, Matrix4, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Rigid transform stored as a homogeneous 4x4 world-to-camera matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Se3Pose {
    m: Matrix4<f64>,
}

impl Default for Se3Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Se3Pose {
    pub fn identity() -> Self {
        Self {
            m: Matrix4::identity(),
        }
    }

    /// Wrap a world-to-camera matrix as-is. Call [`coerce`](Self::coerce)
    /// if the matrix may not be rigid.
    pub fn from_matrix(m: Matrix4<f64>) -> Self {
        Self { m }
    }

    /// Build from a rotation and translation (`x_cam = R * x_world + t`).
    pub fn from_parts(rotation: &Rotation3<f64>, translation: &Vector3<f64>) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(rotation.matrix());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        Self { m }
    }

    pub fn from_isometry(isometry: &Isometry3<f64>) -> Self {
        Self {
            m: isometry.to_homogeneous(),
        }
    }

    /// Convert to an `Isometry3`, projecting the rotation block onto SO(3).
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let rotation = Rotation3::from_matrix(&self.rotation_matrix());
        Isometry3::from_parts(
            Translation3::from(self.translation()),
            UnitQuaternion::from_rotation_matrix(&rotation),
        )
    }

    /// World-to-camera matrix.
    pub fn m(&self) -> Matrix4<f64> {
        self.m
    }

    /// Camera-to-world matrix.
    pub fn inv_m(&self) -> Matrix4<f64> {
        self.m
            .try_inverse()
            .unwrap_or_else(|| rigid_inverse(&self.m))
    }

    pub fn set_m(&mut self, m: Matrix4<f64>) {
        self.m = m;
    }

    /// Set the pose from a camera-to-world matrix.
    ///
    /// A non-invertible input leaves the pose unchanged.
    pub fn set_inv_m(&mut self, inv_m: Matrix4<f64>) {
        if let Some(m) = inv_m.try_inverse() {
            self.m = m;
        }
    }

    pub fn set_from(&mut self, other: &Se3Pose) {
        self.m = other.m;
    }

    /// `self * other` (apply `other` first).
    pub fn compose(&self, other: &Se3Pose) -> Se3Pose {
        Se3Pose { m: self.m * other.m }
    }

    pub fn inverse(&self) -> Se3Pose {
        Se3Pose { m: self.inv_m() }
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.m.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.m.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Camera center in world coordinates.
    pub fn camera_center(&self) -> Vector3<f64> {
        self.inv_m().fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Project the pose back onto SE(3).
    ///
    /// The rotation block is replaced by its nearest rotation (polar
    /// decomposition via SVD, reflections flipped), the bottom row is reset
    /// to `[0, 0, 0, 1]`. Translation is kept. Non-finite matrices are left
    /// untouched.
    pub fn coerce(&mut self) {
        if !self.m.iter().all(|v| v.is_finite()) {
            return;
        }

        let svd = self.rotation_matrix().svd(true, true);
        let (Some(mut u), Some(v_t)) = (svd.u, svd.v_t) else {
            return;
        };
        if (u * v_t).determinant() < 0.0 {
            let mut last = u.column_mut(2);
            last.neg_mut();
        }
        let rotation = u * v_t;

        self.m
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation);
        self.m[(3, 0)] = 0.0;
        self.m[(3, 1)] = 0.0;
        self.m[(3, 2)] = 0.0;
        self.m[(3, 3)] = 1.0;
    }

    /// Whether the rotation block is orthonormal with determinant +1 and
    /// the bottom row is `[0, 0, 0, 1]`, within `eps`.
    pub fn is_rigid(&self, eps: f64) -> bool {
        let r = self.rotation_matrix();
        let orthonormal = (r.transpose() * r - Matrix3::identity()).amax() < eps;
        let proper = (r.determinant() - 1.0).abs() < eps;
        let bottom = (self.m[(3, 0)].abs() + self.m[(3, 1)].abs() + self.m[(3, 2)].abs()) < eps
            && (self.m[(3, 3)] - 1.0).abs() < eps;
        orthonormal && proper && bottom
    }
}

fn rigid_inverse(m: &Matrix4<f64>) -> Matrix4<f64> {
    let r_t = m.fixed_view::<3, 3>(0, 0).transpose();
    let t = m.fixed_view::<3, 1>(0, 3).into_owned();
    let mut inv = Matrix4::identity();
    inv.fixed_view_mut::<3, 3>(0, 0).copy_from(&r_t);
    inv.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-(r_t * t)));
    inv
}
