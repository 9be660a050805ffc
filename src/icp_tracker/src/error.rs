//! Error types for tracker construction and input binding.
//!
//! Numerical failures inside a frame are never reported here: they are
//! absorbed by the damping loop and only show up as a low pose quality.

use thiserror::Error;

/// Errors raised when configuring the tracker or binding frame inputs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("tracker needs at least one pyramid level")]
    NoLevels,

    #[error("expected {expected} per-level iteration types, got {actual}")]
    LevelCountMismatch { expected: usize, actual: usize },

    #[error("termination threshold must be finite and positive, got {0}")]
    InvalidTerminationThreshold(f64),

    #[error("image {width}x{height} is too small for {levels} pyramid levels")]
    ImageTooSmall {
        width: usize,
        height: usize,
        levels: usize,
    },

    #[error("invalid level schedule: {0}")]
    InvalidSchedule(String),

    #[error("invalid quality thresholds: {0}")]
    InvalidQualityThresholds(String),

    #[error("{what} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    ImageSizeMismatch {
        what: &'static str,
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("invalid tracker description: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TrackerError::LevelCountMismatch {
            expected: 5,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "expected 5 per-level iteration types, got 3"
        );

        let err = TrackerError::ImageSizeMismatch {
            what: "live depth",
            expected_width: 640,
            expected_height: 480,
            actual_width: 320,
            actual_height: 240,
        };
        assert!(err.to_string().contains("live depth is 320x240"));
    }
}
