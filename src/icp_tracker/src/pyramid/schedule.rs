//! Per-level iteration budgets and inlier-distance thresholds.
//!
//! Both tables are linear interpolations between a coarse and a fine
//! endpoint. The coarsest level (index `num_levels - 1`) gets the coarse
//! value, the finest level (index 0) the fine value. Coarse levels thus run
//! many cheap iterations with a loose inlier band, fine levels few
//! iterations with a tight one.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Coarse and fine endpoints of an interpolated table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub coarse: T,
    pub fine: T,
}

impl<T> Bounds<T> {
    pub fn new(coarse: T, fine: T) -> Self {
        Self { coarse, fine }
    }
}

/// Default fine-level iteration budget.
pub const DEFAULT_FINE_ITERATIONS: u32 = 2;

/// Default coarse-level squared inlier distance (m²).
pub const DEFAULT_COARSE_THRESHOLD: f32 = 0.01;

/// Default fine-level squared inlier distance (m²).
pub const DEFAULT_FINE_THRESHOLD: f32 = 0.002;

/// Default iteration bounds for a pyramid with `num_levels` levels.
pub fn default_iteration_bounds(num_levels: usize) -> Bounds<u32> {
    Bounds::new(2 * num_levels as u32, DEFAULT_FINE_ITERATIONS)
}

/// Default inlier threshold bounds.
pub fn default_threshold_bounds() -> Bounds<f32> {
    Bounds::new(DEFAULT_COARSE_THRESHOLD, DEFAULT_FINE_THRESHOLD)
}

/// Linearly interpolate from `fine` (index 0) to `coarse` (last index).
///
/// Values are assigned starting from the coarsest level, so a single level
/// receives `coarse`.
pub fn interpolate_levels(num_levels: usize, coarse: f64, fine: f64) -> Vec<f64> {
    if num_levels <= 1 {
        return vec![coarse; num_levels];
    }
    let step = (coarse - fine) / (num_levels - 1) as f64;
    (0..num_levels)
        .map(|level| {
            if level == num_levels - 1 {
                coarse
            } else {
                fine + step * level as f64
            }
        })
        .collect()
}

/// Iteration and threshold tables, indexed finest (0) to coarsest.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSchedule {
    iterations: Vec<u32>,
    thresholds: Vec<f32>,
}

impl LevelSchedule {
    /// Build both tables.
    pub fn new(num_levels: usize, iterations: Bounds<u32>, thresholds: Bounds<f32>) -> Result<Self> {
        if num_levels == 0 {
            return Err(TrackerError::NoLevels);
        }
        validate_thresholds(&thresholds)?;

        Ok(Self {
            iterations: iteration_table(num_levels, &iterations),
            thresholds: threshold_table(num_levels, &thresholds),
        })
    }

    /// Re-derive the tables. `None` leaves the corresponding table untouched.
    pub fn reconfigure(
        &mut self,
        iterations: Option<Bounds<u32>>,
        thresholds: Option<Bounds<f32>>,
    ) -> Result<()> {
        if let Some(thresholds) = &thresholds {
            validate_thresholds(thresholds)?;
        }

        let num_levels = self.num_levels();
        if let Some(iterations) = iterations {
            self.iterations = iteration_table(num_levels, &iterations);
        }
        if let Some(thresholds) = thresholds {
            self.thresholds = threshold_table(num_levels, &thresholds);
        }
        Ok(())
    }

    pub fn num_levels(&self) -> usize {
        self.iterations.len()
    }

    /// Iteration budget of `level`.
    pub fn iterations(&self, level: usize) -> u32 {
        self.iterations[level]
    }

    /// Squared inlier distance of `level`.
    pub fn threshold(&self, level: usize) -> f32 {
        self.thresholds[level]
    }

    pub fn iterations_per_level(&self) -> &[u32] {
        &self.iterations
    }

    pub fn thresholds_per_level(&self) -> &[f32] {
        &self.thresholds
    }

    /// Upper bound on evaluator calls per frame, over all levels.
    pub fn total_iterations(&self) -> u64 {
        self.iterations.iter().map(|&n| n as u64).sum()
    }
}

fn iteration_table(num_levels: usize, bounds: &Bounds<u32>) -> Vec<u32> {
    interpolate_levels(num_levels, bounds.coarse as f64, bounds.fine as f64)
        .into_iter()
        .map(|v| v.round() as u32)
        .collect()
}

fn threshold_table(num_levels: usize, bounds: &Bounds<f32>) -> Vec<f32> {
    interpolate_levels(num_levels, bounds.coarse as f64, bounds.fine as f64)
        .into_iter()
        .map(|v| v as f32)
        .collect()
}

fn validate_thresholds(bounds: &Bounds<f32>) -> Result<()> {
    for (name, value) in [("coarse", bounds.coarse), ("fine", bounds.fine)] {
        if !value.is_finite() || value < 0.0 {
            return Err(TrackerError::InvalidSchedule(format!(
                "{name} inlier threshold must be finite and non-negative, got {value}"
            )));
        }
    }
    Ok(())
}
