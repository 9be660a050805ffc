//! Quality metrics for a tracked pose.

pub mod quality;

pub use quality::{
    assess_quality, default_determinant_threshold, QualityAssessment, QualityInput,
    QualityThresholds, DEFAULT_INLIER_THRESHOLD, DEFAULT_MIN_INLIER_RATIO,
    DEFAULT_RESIDUAL_THRESHOLD,
};
