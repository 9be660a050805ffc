//! Damped Gauss-Newton pose optimization.
//!
//! This module owns everything between an evaluator result and the refined
//! pose: the damped linear solve, the first-order SE(3) increment and the
//! per-level accept/reject loop.

pub mod debug;
pub mod increment;
pub mod newton;
pub mod solver;
pub mod types;

pub use debug::{IterationDebug, LevelDebug, TrackingDebug, TrackingTimingDebug};
pub use increment::{compose_increment, increment_matrix};
pub use newton::{damp, determinant_spd, solve_step, step_rms, SVD_TOLERANCE};
pub use solver::{is_improvement, optimize_level, INITIAL_LAMBDA, LAMBDA_FACTOR};
pub use types::{AcceptedState, IterationType, LevelParams, LevelStatus, LevelSummary};
