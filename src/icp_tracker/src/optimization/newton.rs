//! Damped Gauss-Newton step computation.
//!
//! The step solves `(H + λ·diag(H))·Δp = g` on the parameters active at the
//! current level. Cholesky is tried first; a matrix that is not positive
//! definite falls back to an SVD pseudo-inverse solve. If neither produces a
//! finite step the step is zero, which the loop treats as convergence.

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use tracing::warn;

use super::types::IterationType;

/// Singular value tolerance for the SVD fallback.
pub const SVD_TOLERANCE: f64 = 1e-12;

/// Scale the diagonal of `hessian` by `1 + lambda`.
pub fn damp(hessian: &Matrix6<f64>, lambda: f64) -> Matrix6<f64> {
    let mut damped = *hessian;
    for i in 0..6 {
        damped[(i, i)] *= 1.0 + lambda;
    }
    damped
}

/// Solve the damped system for the parameters of `iteration_type`.
///
/// Components outside the active block are zero.
pub fn solve_step(
    damped_hessian: &Matrix6<f64>,
    gradient: &Vector6<f64>,
    iteration_type: IterationType,
) -> Vector6<f64> {
    let mut step = Vector6::zeros();
    match iteration_type {
        IterationType::None => {}
        IterationType::Both => {
            if let Some(full) = solve_full(damped_hessian, gradient) {
                step = full;
            }
        }
        IterationType::RotationOnly | IterationType::TranslationOnly => {
            let offset = iteration_type.parameter_range().start;
            let h = damped_hessian.fixed_view::<3, 3>(offset, offset).into_owned();
            let g = gradient.fixed_rows::<3>(offset).into_owned();
            if let Some(short) = solve_short(&h, &g) {
                step.fixed_rows_mut::<3>(offset).copy_from(&short);
            }
        }
    }
    step
}

fn solve_full(h: &Matrix6<f64>, g: &Vector6<f64>) -> Option<Vector6<f64>> {
    if !all_finite(h.as_slice()) || !all_finite(g.as_slice()) {
        warn!("non-finite 6x6 system, using a zero step");
        return None;
    }
    if let Some(step) = h.cholesky().map(|chol| chol.solve(g)) {
        if all_finite(step.as_slice()) {
            return Some(step);
        }
    }

    warn!("6x6 system not positive definite, falling back to SVD");
    let step = h.svd(true, true).solve(g, SVD_TOLERANCE).ok()?;
    finite_or_warn(step.as_slice()).then_some(step)
}

fn solve_short(h: &Matrix3<f64>, g: &Vector3<f64>) -> Option<Vector3<f64>> {
    if !all_finite(h.as_slice()) || !all_finite(g.as_slice()) {
        warn!("non-finite 3x3 system, using a zero step");
        return None;
    }
    if let Some(step) = h.cholesky().map(|chol| chol.solve(g)) {
        if all_finite(step.as_slice()) {
            return Some(step);
        }
    }

    warn!("3x3 system not positive definite, falling back to SVD");
    let step = h.svd(true, true).solve(g, SVD_TOLERANCE).ok()?;
    finite_or_warn(step.as_slice()).then_some(step)
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn finite_or_warn(values: &[f64]) -> bool {
    let finite = all_finite(values);
    if !finite {
        warn!("SVD fallback produced a non-finite step, using a zero step");
    }
    finite
}

/// Determinant of a symmetric matrix via Cholesky.
///
/// A matrix that is not positive definite has determinant 0.
pub fn determinant_spd(matrix: &Matrix6<f64>) -> f64 {
    match matrix.cholesky() {
        Some(chol) => {
            let l = chol.l_dirty();
            let diag_product: f64 = (0..6).map(|i| l[(i, i)]).product();
            diag_product * diag_product
        }
        None => 0.0,
    }
}

/// Convergence measure: `sqrt(Σ Δp_i²) / 6`.
pub fn step_rms(step: &Vector6<f64>) -> f64 {
    step.norm() / 6.0
}
