//! Levenberg-Marquardt style loop for a single pyramid level.
//!
//! Each iteration:
//! 1. Evaluate energy, gradient and Hessian at the current inverse pose
//! 2. Accept (energy did not increase) or reject and roll back the pose
//! 3. Solve the damped system built from the last accepted statistics
//! 4. Compose the increment, re-normalize the pose
//! 5. Stop once `|step| / 6` drops below the termination threshold

use nalgebra::Matrix4;
use tracing::trace;

use crate::evaluation::Evaluation;
use crate::pose::Se3Pose;
use crate::timing::{measured_ms, Timer};

use super::debug::{IterationDebug, LevelDebug};
use super::increment::compose_increment;
use super::newton::{damp, solve_step, step_rms};
use super::types::{AcceptedState, IterationType, LevelParams, LevelStatus, LevelSummary};

/// Initial damping factor of every level.
pub const INITIAL_LAMBDA: f64 = 1.0;

/// Damping is divided by this factor on accept and multiplied on reject.
pub const LAMBDA_FACTOR: f64 = 10.0;

/// Whether an evaluation improves on the last accepted one.
///
/// Evaluations without correspondences and NaN energies never do.
pub fn is_improvement(evaluation: &Evaluation, accepted: &AcceptedState) -> bool {
    evaluation.valid_count > 0 && evaluation.energy <= accepted.energy
}

/// Run the damped loop of one level, refining `pose` in place.
///
/// `accepted` carries the normalized gradient and Hessian across levels;
/// its energy and count are reset here. `evaluate` receives the candidate
/// camera-to-world matrix and is called at most `params.max_iterations`
/// times.
pub fn optimize_level<F>(
    pose: &mut Se3Pose,
    accepted: &mut AcceptedState,
    params: &LevelParams,
    mut evaluate: F,
    mut debug: Option<&mut LevelDebug>,
) -> LevelSummary
where
    F: FnMut(&Matrix4<f64>) -> Evaluation,
{
    let iteration_type = params.iteration_type;
    if iteration_type == IterationType::None {
        return LevelSummary::skipped();
    }

    accepted.reset_level();
    let mut lambda = INITIAL_LAMBDA;
    let mut snapshot = *pose;
    let mut summary = LevelSummary {
        status: LevelStatus::Exhausted,
        iterations: 0,
        accepted: 0,
        rejected: 0,
        lambda,
    };

    for iteration in 0..params.max_iterations as usize {
        let timer = Timer::new("evaluate");
        let evaluation = evaluate(&pose.inv_m());
        let evaluate_ms = measured_ms(&timer);
        summary.iterations += 1;

        let improved = is_improvement(&evaluation, accepted);
        if improved {
            snapshot = *pose;
            let n = evaluation.valid_count as f64;
            accepted.energy = evaluation.energy;
            accepted.valid_count = evaluation.valid_count;
            accepted.gradient = evaluation.gradient / n;
            accepted.hessian = evaluation.hessian / n;
            lambda /= LAMBDA_FACTOR;
            summary.accepted += 1;
        } else {
            *pose = snapshot;
            lambda *= LAMBDA_FACTOR;
            summary.rejected += 1;
        }

        let damped = damp(&accepted.hessian, lambda);
        let step = solve_step(&damped, &accepted.gradient, iteration_type);
        pose.set_inv_m(compose_increment(iteration_type, &step, &pose.inv_m()));
        pose.coerce();

        let rms = step_rms(&step);
        trace!(
            iteration,
            energy = evaluation.energy,
            valid = evaluation.valid_count,
            improved,
            lambda,
            step_rms = rms,
            "ICP iteration"
        );

        if let Some(level_debug) = debug.as_deref_mut() {
            let mut record = IterationDebug::new(iteration);
            record.energy = evaluation.energy;
            record.valid_count = evaluation.valid_count;
            record.accepted = improved;
            record.lambda = lambda;
            record.set_step(&step, rms);
            record.evaluate_ms = evaluate_ms;
            level_debug.iterations.push(record);
        }

        if rms < params.termination_threshold {
            summary.status = LevelStatus::Converged;
            break;
        }
    }

    summary.lambda = lambda;
    if let Some(level_debug) = debug {
        level_debug.status = summary.status;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix6, Rotation3, Vector3, Vector6};

    fn params(iteration_type: IterationType, max_iterations: u32) -> LevelParams {
        LevelParams {
            iteration_type,
            max_iterations,
            termination_threshold: 1e-12,
        }
    }

    /// Quadratic energy pulling the camera-to-world translation to `target`.
    fn quadratic(target: Vector3<f64>) -> impl FnMut(&Matrix4<f64>) -> Evaluation {
        move |inv: &Matrix4<f64>| {
            let t = inv.fixed_view::<3, 1>(0, 3).into_owned();
            let r = target - t;
            let mut gradient = Vector6::zeros();
            gradient.fixed_rows_mut::<3>(3).copy_from(&r);
            let mut hessian = Matrix6::identity();
            hessian.fixed_view_mut::<3, 3>(0, 0).fill(0.0);
            Evaluation {
                energy: r.norm_squared(),
                gradient,
                hessian,
                valid_count: 1,
            }
        }
    }

    #[test]
    fn test_converges_on_quadratic() {
        let target = Vector3::new(0.1, -0.05, 0.2);
        let mut pose = Se3Pose::identity();
        let mut accepted = AcceptedState::new();

        let summary = optimize_level(
            &mut pose,
            &mut accepted,
            &LevelParams {
                termination_threshold: 1e-9,
                ..params(IterationType::TranslationOnly, 30)
            },
            quadratic(target),
            None,
        );

        assert_eq!(summary.status, LevelStatus::Converged);
        assert_relative_eq!(pose.camera_center(), target, epsilon = 1e-7);
        assert!(pose.is_rigid(1e-9));
    }

    #[test]
    fn test_evaluator_call_bound() {
        let mut calls = 0;
        let mut pose = Se3Pose::identity();
        let mut accepted = AcceptedState::new();
        let mut energy = 10.0;

        let summary = optimize_level(
            &mut pose,
            &mut accepted,
            &params(IterationType::Both, 7),
            |_: &Matrix4<f64>| {
                calls += 1;
                energy *= 0.5;
                Evaluation {
                    energy,
                    gradient: Vector6::repeat(1.0),
                    hessian: Matrix6::identity(),
                    valid_count: 100,
                }
            },
            None,
        );

        assert_eq!(calls, 7);
        assert_eq!(summary.iterations, 7);
        assert_eq!(summary.status, LevelStatus::Exhausted);
        assert_eq!(summary.accepted, 7);
    }

    #[test]
    fn test_increasing_energy_keeps_pose_and_raises_damping() {
        let initial = Se3Pose::from_parts(
            &Rotation3::from_euler_angles(0.1, 0.0, -0.2),
            &Vector3::new(0.3, 0.1, -0.4),
        );
        let mut pose = initial;
        let mut accepted = AcceptedState::new();
        let mut energy = 0.0;
        let mut level_debug = LevelDebug::new(0, IterationType::Both, 12, 0.01);

        let summary = optimize_level(
            &mut pose,
            &mut accepted,
            &params(IterationType::Both, 12),
            |_: &Matrix4<f64>| {
                energy += 1.0;
                Evaluation {
                    energy,
                    gradient: Vector6::new(0.5, -0.5, 0.2, 1.0, 2.0, -1.0),
                    hessian: Matrix6::identity() * 4.0,
                    valid_count: 4,
                }
            },
            Some(&mut level_debug),
        );

        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 11);
        assert_eq!(accepted.energy, 1.0);
        assert_relative_eq!(pose.m(), initial.m(), epsilon = 1e-6);

        let lambdas: Vec<f64> = level_debug.iterations.iter().map(|i| i.lambda).collect();
        assert_eq!(lambdas.len(), 12);
        for pair in lambdas.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_eq!(level_debug.status, LevelStatus::Exhausted);
    }

    #[test]
    fn test_no_correspondences_leaves_pose_untouched() {
        let initial = Se3Pose::from_parts(&Rotation3::identity(), &Vector3::new(1.0, 2.0, 3.0));
        let mut pose = initial;
        let mut accepted = AcceptedState::new();

        let summary = optimize_level(
            &mut pose,
            &mut accepted,
            &LevelParams {
                termination_threshold: 1e-3,
                ..params(IterationType::Both, 10)
            },
            |_: &Matrix4<f64>| Evaluation::failed(),
            None,
        );

        assert_eq!(summary.status, LevelStatus::Converged);
        assert_eq!(summary.iterations, 1);
        assert_eq!(summary.rejected, 1);
        assert_relative_eq!(pose.m(), initial.m(), epsilon = 1e-12);
    }

    #[test]
    fn test_nan_energy_is_rejected() {
        let mut accepted = AcceptedState::new();
        let mut evaluation = Evaluation::failed();
        evaluation.valid_count = 10;
        evaluation.energy = f64::NAN;
        assert!(!is_improvement(&evaluation, &accepted));

        evaluation.energy = 0.5;
        assert!(is_improvement(&evaluation, &accepted));
        accepted.energy = 0.4;
        assert!(!is_improvement(&evaluation, &accepted));
    }

    #[test]
    fn test_skipped_level() {
        let mut pose = Se3Pose::identity();
        let mut accepted = AcceptedState::new();
        let mut calls = 0;

        let summary = optimize_level(
            &mut pose,
            &mut accepted,
            &params(IterationType::None, 10),
            |_: &Matrix4<f64>| {
                calls += 1;
                Evaluation::failed()
            },
            None,
        );

        assert_eq!(summary.status, LevelStatus::Skipped);
        assert_eq!(calls, 0);
    }
}
