//! Tracking quality classification.
//!
//! After the finest level the last accepted statistics are condensed into
//! three numbers:
//!
//! - final residual: RMS point-to-plane error where every missing
//!   correspondence counts with the squared inlier threshold
//! - inlier ratio: accepted correspondences over valid live depth samples
//! - Hessian determinant: conditioning of the 6-DoF system, only when the
//!   finest level solves all six parameters
//!
//! and mapped to [`PoseQuality`].

use nalgebra::Matrix6;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::optimization::{determinant_spd, IterationType};
use crate::state::PoseQuality;

/// Default upper bound on the final residual for a good pose (m).
pub const DEFAULT_RESIDUAL_THRESHOLD: f64 = 0.25;

/// Default lower bound on the inlier ratio for a good pose.
pub const DEFAULT_INLIER_THRESHOLD: f64 = 0.7;

/// Default lower bound on the scaled Hessian determinant, `e^-36`.
pub fn default_determinant_threshold() -> f64 {
    (-36.0f64).exp()
}

/// Inlier ratio below which tracking always fails.
pub const DEFAULT_MIN_INLIER_RATIO: f64 = 0.3;

/// Thresholds used by [`assess_quality`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub residual: f64,
    pub inlier_ratio: f64,
    pub determinant: f64,
    pub min_inlier_ratio: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            residual: DEFAULT_RESIDUAL_THRESHOLD,
            inlier_ratio: DEFAULT_INLIER_THRESHOLD,
            determinant: default_determinant_threshold(),
            min_inlier_ratio: DEFAULT_MIN_INLIER_RATIO,
        }
    }
}

impl QualityThresholds {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("residual", self.residual),
            ("inlier_ratio", self.inlier_ratio),
            ("determinant", self.determinant),
            ("min_inlier_ratio", self.min_inlier_ratio),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(TrackerError::InvalidQualityThresholds(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("inlier_ratio", self.inlier_ratio),
            ("min_inlier_ratio", self.min_inlier_ratio),
        ] {
            if value > 1.0 {
                return Err(TrackerError::InvalidQualityThresholds(format!(
                    "{name} must not exceed 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Final statistics of a tracked frame.
#[derive(Debug, Clone, Copy)]
pub struct QualityInput<'a> {
    /// Last accepted energy (mean squared residual).
    pub energy: f64,
    /// Last accepted valid count.
    pub valid_count: usize,
    /// Valid depth samples in the full-resolution live frame.
    pub max_valid_count: usize,
    /// Last accepted Hessian, normalized by `valid_count`.
    pub hessian: &'a Matrix6<f64>,
    /// Squared inlier distance of the finest level.
    pub dist_threshold: f64,
    /// Iteration type of the finest level.
    pub finest_iteration_type: IterationType,
}

/// Result of [`assess_quality`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityAssessment {
    pub final_residual: f64,
    pub inlier_ratio: f64,
    pub determinant: Option<f64>,
    pub quality: PoseQuality,
}

/// Classify the tracking result.
///
/// Good when the residual is below and the inlier ratio above their
/// thresholds, poor when exactly one of the two holds, failed otherwise.
/// An inlier ratio below `min_inlier_ratio` always fails; a determinant
/// below its threshold caps the result at poor.
pub fn assess_quality(input: &QualityInput<'_>, thresholds: &QualityThresholds) -> QualityAssessment {
    if input.max_valid_count == 0 {
        return QualityAssessment {
            final_residual: input.dist_threshold.sqrt(),
            inlier_ratio: 0.0,
            determinant: None,
            quality: PoseQuality::Failed,
        };
    }

    let max = input.max_valid_count as f64;
    let n = input.valid_count.min(input.max_valid_count) as f64;
    let inlier_energy = if n > 0.0 { n * input.energy } else { 0.0 };
    let final_residual = ((inlier_energy + (max - n) * input.dist_threshold) / max).sqrt();
    let inlier_ratio = n / max;

    let determinant = (input.finest_iteration_type == IterationType::Both).then(|| {
        let det = determinant_spd(&(input.hessian * (n / max)));
        if det.is_finite() {
            det
        } else {
            0.0
        }
    });

    let residual_ok = final_residual < thresholds.residual;
    let inliers_ok = inlier_ratio > thresholds.inlier_ratio;
    let mut quality = match (residual_ok, inliers_ok) {
        (true, true) => PoseQuality::Good,
        (true, false) | (false, true) => PoseQuality::Poor,
        (false, false) => PoseQuality::Failed,
    };

    if inlier_ratio < thresholds.min_inlier_ratio {
        quality = PoseQuality::Failed;
    }
    if let Some(det) = determinant {
        if det < thresholds.determinant {
            quality = quality.min(PoseQuality::Poor);
        }
    }

    QualityAssessment {
        final_residual,
        inlier_ratio,
        determinant,
        quality,
    }
}
