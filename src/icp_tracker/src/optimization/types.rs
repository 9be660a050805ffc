//! Type definitions for the damped pose optimization.

use std::fmt;
use std::ops::Range;

use nalgebra::{Matrix6, Vector6};
use serde::{Deserialize, Serialize};

/// Subset of the six tangent-space parameters estimated at a pyramid level.
///
/// Parameters use the layout `[rx, ry, rz, tx, ty, tz]`: rotation first,
/// translation second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationType {
    /// Level is skipped.
    None,
    /// Only the three rotational parameters.
    RotationOnly,
    /// Only the three translational parameters.
    TranslationOnly,
    /// Full 6-DoF update.
    #[default]
    Both,
}

impl IterationType {
    /// Indices of the active parameters in the 6-vector layout.
    pub fn parameter_range(&self) -> Range<usize> {
        match self {
            IterationType::None => 0..0,
            IterationType::RotationOnly => 0..3,
            IterationType::TranslationOnly => 3..6,
            IterationType::Both => 0..6,
        }
    }

    /// Zero the components of `v` that are not estimated at this level.
    pub fn mask(&self, v: &mut Vector6<f64>) {
        let active = self.parameter_range();
        for i in 0..6 {
            if !active.contains(&i) {
                v[i] = 0.0;
            }
        }
    }

    /// Parse the single-character level code: `b`, `r`, `t` or `n`.
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_lowercase() {
            'b' => Some(IterationType::Both),
            'r' => Some(IterationType::RotationOnly),
            't' => Some(IterationType::TranslationOnly),
            'n' => Some(IterationType::None),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            IterationType::None => 'n',
            IterationType::RotationOnly => 'r',
            IterationType::TranslationOnly => 't',
            IterationType::Both => 'b',
        }
    }
}

impl fmt::Display for IterationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IterationType::None => "none",
            IterationType::RotationOnly => "rotation",
            IterationType::TranslationOnly => "translation",
            IterationType::Both => "both",
        };
        f.write_str(name)
    }
}

/// Per-level inputs to the damped optimization loop.
#[derive(Debug, Clone, Copy)]
pub struct LevelParams {
    pub iteration_type: IterationType,
    /// Upper bound on evaluator calls at this level.
    pub max_iterations: u32,
    /// Convergence threshold on `|step| / 6`.
    pub termination_threshold: f64,
}

/// How a pyramid level finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelStatus {
    /// Iteration type was `None`.
    Skipped,
    /// Step fell below the termination threshold.
    Converged,
    /// Iteration budget used up.
    Exhausted,
}

/// Last accepted statistics, carried across levels within one frame.
///
/// Gradient and Hessian are normalized by the accepted valid count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedState {
    pub energy: f64,
    pub valid_count: usize,
    pub gradient: Vector6<f64>,
    pub hessian: Matrix6<f64>,
}

impl AcceptedState {
    /// Frame-start state: zero gradient/Hessian, nothing accepted.
    pub fn new() -> Self {
        Self {
            energy: f64::INFINITY,
            valid_count: 0,
            gradient: Vector6::zeros(),
            hessian: Matrix6::zeros(),
        }
    }

    /// Forget the accepted energy and count at the start of a level.
    /// The normalized gradient and Hessian are kept.
    pub fn reset_level(&mut self) {
        self.energy = f64::INFINITY;
        self.valid_count = 0;
    }
}

impl Default for AcceptedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of one level of the optimization.
#[derive(Debug, Clone, Copy)]
pub struct LevelSummary {
    pub status: LevelStatus,
    /// Evaluator calls made at this level.
    pub iterations: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Damping factor after the last iteration.
    pub lambda: f64,
}

impl LevelSummary {
    pub fn skipped() -> Self {
        Self {
            status: LevelStatus::Skipped,
            iterations: 0,
            accepted: 0,
            rejected: 0,
            lambda: 1.0,
        }
    }
}
