//! Pyramidal point-to-plane ICP camera tracking for depth sensors.
//!
//! This library refines the pose of a depth camera against a reference
//! surface (point and normal maps rendered from a fused model) using a
//! coarse-to-fine image pyramid and a damped Gauss-Newton loop.
//!
//! # Architecture
//!
//! A tracked frame runs through these phases:
//! - Phase 1: Bind the live depth and rebuild the depth pyramid
//! - Phase 2: Correspondence evaluation (energy, gradient + Hessian)
//! - Phase 3: Damped optimization per level, coarsest first
//! - Phase 4: Quality assessment (residual, inlier ratio, determinant)
//!
//! # Usage
//!
//! ```ignore
//! use icp_tracker::{DepthTracker, TrackerConfig, TrackingState, View};
//!
//! // Same description string a fusion front end would pass
//! let config: TrackerConfig = "levels=rrrbb,minstep=1e-3,outlierC=0.01,outlierF=0.002".parse()?;
//! let mut tracker = DepthTracker::new((640, 480), config)?;
//!
//! // Reference maps rendered from the model at `state.reference_pose`
//! let mut state = TrackingState::new(render_point_cloud(&model));
//! let view = View { depth: live_depth, intrinsics };
//!
//! tracker.track_camera(&mut state, &view)?;
//! println!("pose: {:?}, quality: {}", state.pose, state.pose_quality);
//! ```

pub mod camera;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod image;
pub mod optimization;
pub mod pose;
pub mod pyramid;
pub mod scoring;
pub mod state;
pub mod test_utils;
pub mod timing;
pub mod tracker;

pub use camera::Intrinsics;
pub use config::{TrackerConfig, DEFAULT_TERMINATION_THRESHOLD};
pub use error::TrackerError;
pub use evaluation::{
    CorrespondenceEvaluator, CpuEvaluator, Evaluation, EvaluationInput, EvaluatorBackend,
    ParallelEvaluator,
};
pub use image::{DepthImage, Image, PointMap};
pub use optimization::{
    AcceptedState, IterationDebug, IterationType, LevelDebug, LevelParams, LevelStatus,
    LevelSummary, TrackingDebug, TrackingTimingDebug,
};
pub use pose::Se3Pose;
pub use pyramid::{Bounds, LevelSchedule, TrackingPyramid};
pub use scoring::{assess_quality, QualityAssessment, QualityInput, QualityThresholds};
pub use state::{PointCloud, PoseQuality, TrackingState, View};

// High-level API (recommended for most users)
pub use tracker::{DepthTracker, DepthTrackerBuilder};
