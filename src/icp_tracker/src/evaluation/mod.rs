//! Correspondence evaluation for point-to-plane ICP.
//!
//! An evaluator turns a candidate camera pose into the energy, gradient and
//! Gauss-Newton Hessian of the point-to-plane error between the live depth
//! and the reference surface. Two implementations are provided:
//!
//! - [`CpuEvaluator`]: sequential reference implementation
//! - [`ParallelEvaluator`]: rayon row-parallel implementation

pub mod cpu;
pub mod parallel;
pub mod types;

pub use cpu::{compute_point_terms, transform_point, CpuEvaluator, MIN_VALID_DEPTH};
pub use parallel::ParallelEvaluator;
pub use types::{
    CorrespondenceEvaluator, Evaluation, EvaluationInput, EvaluatorBackend, NormalEquations,
};
