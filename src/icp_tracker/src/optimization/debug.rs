//! Debug records for inspecting a tracked frame.
//!
//! [`TrackingDebug`] captures every evaluator call of every level together
//! with the quality assessment, so a frame can be dumped as JSON and
//! compared across runs.

use nalgebra::{Matrix4, Vector6};
use serde::Serialize;

use crate::state::PoseQuality;

use super::types::{IterationType, LevelStatus};

/// One evaluator call of the damped loop.
#[derive(Debug, Clone, Serialize)]
pub struct IterationDebug {
    /// Iteration number within the level (0-indexed).
    pub iteration: usize,

    /// Energy returned by the evaluator.
    pub energy: f64,

    /// Valid correspondences returned by the evaluator.
    pub valid_count: usize,

    /// Whether the evaluation was accepted.
    pub accepted: bool,

    /// Damping factor used for the step after the accept/reject decision.
    pub lambda: f64,

    /// Solved step, `[rx, ry, rz, tx, ty, tz]`.
    pub step: Vec<f64>,

    /// `|step| / 6`.
    pub step_rms: f64,

    /// Evaluator time in milliseconds (profiling builds only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluate_ms: Option<f64>,
}

impl IterationDebug {
    pub fn new(iteration: usize) -> Self {
        Self {
            iteration,
            energy: 0.0,
            valid_count: 0,
            accepted: false,
            lambda: 1.0,
            step: vec![0.0; 6],
            step_rms: 0.0,
            evaluate_ms: None,
        }
    }

    pub fn set_step(&mut self, step: &Vector6<f64>, step_rms: f64) {
        self.step = step.iter().copied().collect();
        self.step_rms = step_rms;
    }

    /// Format as a compact log line.
    pub fn to_log_line(&self) -> String {
        format!(
            "iter={} energy={:.6e} valid={} {} lambda={:.1e} step_rms={:.3e}",
            self.iteration,
            self.energy,
            self.valid_count,
            if self.accepted { "accept" } else { "reject" },
            self.lambda,
            self.step_rms,
        )
    }
}

/// History of one pyramid level.
#[derive(Debug, Clone, Serialize)]
pub struct LevelDebug {
    /// Pyramid level, 0 is the finest.
    pub level: usize,
    pub iteration_type: IterationType,
    pub max_iterations: u32,
    /// Squared inlier distance used at this level.
    pub dist_threshold: f32,
    pub status: LevelStatus,
    pub iterations: Vec<IterationDebug>,

    /// Level time in milliseconds (profiling builds only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f64>,
}

impl LevelDebug {
    pub fn new(
        level: usize,
        iteration_type: IterationType,
        max_iterations: u32,
        dist_threshold: f32,
    ) -> Self {
        Self {
            level,
            iteration_type,
            max_iterations,
            dist_threshold,
            status: LevelStatus::Skipped,
            iterations: Vec::new(),
            elapsed_ms: None,
        }
    }
}

/// Timing breakdown of a frame (profiling builds only).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackingTimingDebug {
    pub total_ms: f64,
    /// Binding the inputs and rebuilding the pyramid.
    pub prepare_ms: f64,
    /// All pyramid levels.
    pub optimize_ms: f64,
    pub quality_ms: f64,
}

/// Complete debug history for one `track_camera` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackingDebug {
    /// World-to-camera pose before tracking, row-major 4x4.
    pub initial_pose: Vec<f64>,

    /// World-to-camera pose after tracking, row-major 4x4.
    pub final_pose: Vec<f64>,

    /// Levels in processing order (coarsest first).
    pub levels: Vec<LevelDebug>,

    /// Evaluator calls over all levels.
    pub total_evaluations: usize,

    /// Valid depth samples in the full-resolution live frame.
    pub max_valid_count: usize,

    /// Last accepted energy.
    pub final_energy: f64,

    /// Last accepted valid count.
    pub valid_count: usize,

    pub final_residual: f64,
    pub inlier_ratio: f64,

    /// Hessian determinant, present when the finest level solves all six
    /// parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub determinant: Option<f64>,

    pub pose_quality: Option<PoseQuality>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<TrackingTimingDebug>,
}

impl TrackingDebug {
    pub fn new() -> Self {
        Self {
            initial_pose: vec![0.0; 16],
            final_pose: vec![0.0; 16],
            ..Default::default()
        }
    }

    pub fn set_initial_pose(&mut self, m: &Matrix4<f64>) {
        self.initial_pose = row_major(m);
    }

    pub fn set_final_pose(&mut self, m: &Matrix4<f64>) {
        self.final_pose = row_major(m);
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Convert to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Format as compact multi-line log.
    pub fn to_log(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "=== ICP frame evals={} valid={}/{} energy={:.6e} residual={:.4} inliers={:.3} quality={} ===",
            self.total_evaluations,
            self.valid_count,
            self.max_valid_count,
            self.final_energy,
            self.final_residual,
            self.inlier_ratio,
            self.pose_quality.map_or(-1.0, |q| q.score()),
        ));
        for level in &self.levels {
            lines.push(format!(
                "  level={} type={} budget={} status={:?}",
                level.level, level.iteration_type, level.max_iterations, level.status,
            ));
            for iter in &level.iterations {
                lines.push(format!("    {}", iter.to_log_line()));
            }
        }
        lines.join("\n")
    }
}

fn row_major(m: &Matrix4<f64>) -> Vec<f64> {
    (0..4)
        .flat_map(|i| (0..4).map(move |j| m[(i, j)]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_debug_set_step() {
        let mut debug = IterationDebug::new(0);
        debug.set_step(&Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0), 0.5);
        assert_eq!(debug.step, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(debug.step_rms, 0.5);
    }

    #[test]
    fn test_pose_is_row_major() {
        let mut m = Matrix4::identity();
        m[(0, 3)] = 7.0;
        let mut debug = TrackingDebug::new();
        debug.set_final_pose(&m);
        assert_eq!(debug.final_pose[3], 7.0);
        assert_eq!(debug.final_pose[12], 0.0);
    }

    #[test]
    fn test_tracking_debug_to_json() {
        let mut debug = TrackingDebug::new();
        let mut level = LevelDebug::new(2, IterationType::RotationOnly, 6, 0.01);
        level.status = LevelStatus::Converged;
        level.iterations.push(IterationDebug::new(0));
        debug.levels.push(level);
        debug.pose_quality = Some(PoseQuality::Good);

        let json = debug.to_json().unwrap();
        assert!(json.contains("\"rotation_only\""));
        assert!(json.contains("\"converged\""));
        assert!(json.contains("\"good\""));
        assert!(!json.contains("determinant"));
    }

    #[test]
    fn test_to_log() {
        let mut debug = TrackingDebug::new();
        let mut level = LevelDebug::new(0, IterationType::Both, 2, 0.002);
        let mut iter = IterationDebug::new(1);
        iter.accepted = true;
        level.iterations.push(iter);
        debug.levels.push(level);

        let log = debug.to_log();
        assert!(log.contains("level=0 type=both"));
        assert!(log.contains("iter=1"));
        assert!(log.contains("accept"));
    }
}
