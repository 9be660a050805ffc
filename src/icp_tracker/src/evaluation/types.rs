//! Type definitions for correspondence evaluation.

use nalgebra::{Matrix4, Matrix6, Vector6};
use serde::{Deserialize, Serialize};

use crate::camera::Intrinsics;
use crate::image::{DepthImage, PointMap};
use crate::optimization::IterationType;

/// Point-to-plane statistics at one candidate pose.
///
/// `gradient` and `hessian` are raw sums over the valid correspondences, in
/// the `[rx, ry, rz, tx, ty, tz]` layout. Components outside the level's
/// iteration type are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Mean squared point-to-plane residual, 0 without correspondences.
    pub energy: f64,
    /// `Σ b·A`.
    pub gradient: Vector6<f64>,
    /// `Σ A·Aᵀ`.
    pub hessian: Matrix6<f64>,
    /// Number of pixels that found a correspondence.
    pub valid_count: usize,
}

impl Evaluation {
    /// Result of an evaluation without a single correspondence.
    pub fn failed() -> Self {
        Self {
            energy: 0.0,
            gradient: Vector6::zeros(),
            hessian: Matrix6::zeros(),
            valid_count: 0,
        }
    }
}

/// Everything an evaluator needs for one pyramid level.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    /// Live depth at this level.
    pub depth: &'a DepthImage,
    /// Intrinsics matching `depth`.
    pub view_intrinsics: Intrinsics,
    /// Level-0 reference surface points (world frame).
    pub points: &'a PointMap,
    /// Level-0 reference normals (world frame).
    pub normals: &'a PointMap,
    /// Intrinsics matching `points` and `normals`.
    pub scene_intrinsics: Intrinsics,
    /// World-to-reference-camera transform.
    pub scene_pose: Matrix4<f64>,
    /// Maximum squared point distance of an inlier (m²).
    pub dist_threshold: f32,
    pub iteration_type: IterationType,
}

/// Evaluates energy, gradient and Hessian at a candidate pose.
///
/// `approx_inv_pose` is the candidate camera-to-world transform. This is
/// the only place where per-pixel correspondence search happens; the
/// optimization loop treats it as a black box.
pub trait CorrespondenceEvaluator: Send + Sync {
    fn evaluate(&self, input: &EvaluationInput<'_>, approx_inv_pose: &Matrix4<f64>) -> Evaluation;
}

/// Built-in evaluator implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorBackend {
    /// Single-threaded reference implementation.
    Cpu,
    /// Row-parallel implementation on the rayon thread pool.
    #[default]
    Parallel,
}

impl EvaluatorBackend {
    pub fn create(&self) -> Box<dyn CorrespondenceEvaluator> {
        match self {
            EvaluatorBackend::Cpu => Box::new(super::CpuEvaluator::new()),
            EvaluatorBackend::Parallel => Box::new(super::ParallelEvaluator::new()),
        }
    }
}

/// Running sums of the point-to-plane normal equations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalEquations {
    pub sum_sq_residual: f64,
    pub gradient: Vector6<f64>,
    pub hessian: Matrix6<f64>,
    pub count: usize,
}

impl NormalEquations {
    pub fn zeros() -> Self {
        Self {
            sum_sq_residual: 0.0,
            gradient: Vector6::zeros(),
            hessian: Matrix6::zeros(),
            count: 0,
        }
    }

    /// Add one correspondence with residual `b` and Jacobian row `a`.
    #[inline]
    pub fn add(&mut self, b: f64, a: &Vector6<f64>) {
        self.sum_sq_residual += b * b;
        self.gradient += a * b;
        self.hessian += a * a.transpose();
        self.count += 1;
    }

    /// Combine partial sums from another worker.
    pub fn merge(mut self, other: NormalEquations) -> Self {
        self.sum_sq_residual += other.sum_sq_residual;
        self.gradient += other.gradient;
        self.hessian += other.hessian;
        self.count += other.count;
        self
    }

    pub fn finish(self) -> Evaluation {
        if self.count == 0 {
            return Evaluation::failed();
        }
        Evaluation {
            energy: self.sum_sq_residual / self.count as f64,
            gradient: self.gradient,
            hessian: self.hessian,
            valid_count: self.count,
        }
    }
}

impl Default for NormalEquations {
    fn default() -> Self {
        Self::zeros()
    }
}
