//! Row-parallel point-to-plane evaluator.
//!
//! Rows of the live depth image are folded into per-worker
//! [`NormalEquations`] on the rayon pool and reduced into a single sum. The
//! per-pixel terms are the ones of the CPU reference evaluator.

use nalgebra::Matrix4;
use rayon::prelude::*;

use super::cpu::compute_point_terms;
use super::types::{CorrespondenceEvaluator, Evaluation, EvaluationInput, NormalEquations};

#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelEvaluator;

impl ParallelEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl CorrespondenceEvaluator for ParallelEvaluator {
    fn evaluate(&self, input: &EvaluationInput<'_>, approx_inv_pose: &Matrix4<f64>) -> Evaluation {
        let width = input.depth.width();
        if width == 0 {
            return Evaluation::failed();
        }

        input
            .depth
            .as_slice()
            .par_chunks(width)
            .enumerate()
            .fold(NormalEquations::zeros, |mut sums, (y, row)| {
                for (x, &depth) in row.iter().enumerate() {
                    if let Some((b, a)) = compute_point_terms(input, approx_inv_pose, x, y, depth) {
                        sums.add(b, &a);
                    }
                }
                sums
            })
            .reduce(NormalEquations::zeros, NormalEquations::merge)
            .finish()
    }
}
