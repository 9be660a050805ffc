//! High-level depth tracking API.
//!
//! [`DepthTracker`] owns the pyramid buffers, the level schedule and the
//! correspondence evaluator. Every [`track_camera`](DepthTracker::track_camera)
//! call refines the pose in a caller-owned [`TrackingState`] against the
//! reference surface stored in the same state.
//!
//! # Example
//!
//! ```ignore
//! use icp_tracker::{DepthTracker, IterationType, TrackingState, View};
//!
//! let mut tracker = DepthTracker::builder((640, 480))
//!     .levels(vec![IterationType::Both; 3])
//!     .build()?;
//!
//! // `state.point_cloud` holds the surface rendered from `state.reference_pose`
//! tracker.track_camera(&mut state, &view)?;
//! println!("quality: {}", state.pose_quality);
//! ```

use std::fmt;

use anyhow::{Context, Result};
use nalgebra::Matrix4;
use tracing::debug;

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::evaluation::{CorrespondenceEvaluator, EvaluationInput, EvaluatorBackend};
use crate::optimization::{
    optimize_level, AcceptedState, IterationType, LevelDebug, LevelParams, TrackingDebug,
    TrackingTimingDebug,
};
use crate::pyramid::{count_valid_depths, Bounds, LevelSchedule, TrackingPyramid};
use crate::scoring::{assess_quality, QualityAssessment, QualityInput, QualityThresholds};
use crate::state::{TrackingState, View};
use crate::timing::{measured_ms, Timer, PROFILING_ENABLED};

/// Pyramidal point-to-plane ICP tracker for depth cameras.
pub struct DepthTracker {
    config: TrackerConfig,
    pyramid: TrackingPyramid,
    schedule: LevelSchedule,
    evaluator: Box<dyn CorrespondenceEvaluator>,
}

impl fmt::Debug for DepthTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepthTracker")
            .field("config", &self.config)
            .field("image_size", &self.pyramid.image_size())
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

impl DepthTracker {
    /// Create a tracker for frames of `image_size` using the evaluator named
    /// by `config.backend`.
    pub fn new(image_size: (usize, usize), config: TrackerConfig) -> Result<Self> {
        let evaluator = config.backend.create();
        Self::with_evaluator(image_size, config, evaluator)
    }

    /// Create a tracker with a caller-provided evaluator.
    ///
    /// `config.backend` is kept for reference but not used.
    pub fn with_evaluator(
        image_size: (usize, usize),
        config: TrackerConfig,
        evaluator: Box<dyn CorrespondenceEvaluator>,
    ) -> Result<Self> {
        config
            .validate()
            .context("Invalid tracker configuration")?;
        let schedule = config.schedule()?;
        let pyramid = TrackingPyramid::new(image_size, &config.levels)
            .with_context(|| format!("Failed to allocate pyramid for {image_size:?}"))?;

        debug!(
            width = image_size.0,
            height = image_size.1,
            levels = config.num_levels(),
            description = %config,
            "Created depth tracker"
        );

        Ok(Self {
            config,
            pyramid,
            schedule,
            evaluator,
        })
    }

    /// Create a builder for configuring the tracker.
    pub fn builder(image_size: (usize, usize)) -> DepthTrackerBuilder {
        DepthTrackerBuilder::new(image_size)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn num_levels(&self) -> usize {
        self.pyramid.num_levels()
    }

    /// Full-resolution `(width, height)` expected for every frame.
    pub fn image_size(&self) -> (usize, usize) {
        self.pyramid.image_size()
    }

    /// Iteration budget per level, finest first.
    pub fn iterations_per_level(&self) -> &[u32] {
        self.schedule.iterations_per_level()
    }

    /// Squared inlier distance per level, finest first.
    pub fn distance_thresholds(&self) -> &[f32] {
        self.schedule.thresholds_per_level()
    }

    /// Re-derive the per-level tables. `None` leaves a table untouched.
    pub fn reconfigure_levels(
        &mut self,
        iterations: Option<Bounds<u32>>,
        thresholds: Option<Bounds<f32>>,
    ) -> Result<()> {
        self.schedule
            .reconfigure(iterations, thresholds)
            .context("Failed to reconfigure levels")?;

        if iterations.is_some() {
            self.config.iterations = iterations;
        }
        if let Some(thresholds) = thresholds {
            self.config.thresholds = thresholds;
        }
        debug!(
            iterations = ?self.schedule.iterations_per_level(),
            thresholds = ?self.schedule.thresholds_per_level(),
            "Reconfigured levels"
        );
        Ok(())
    }

    /// Refine `state.pose` against `state.point_cloud` using the live `view`
    /// and write the resulting confidence to `state.pose_quality`.
    ///
    /// Only input size mismatches are reported as errors, and they leave the
    /// state untouched. Poor alignment shows up as a low quality instead.
    pub fn track_camera(&mut self, state: &mut TrackingState, view: &View) -> Result<()> {
        self.track(state, view, None)?;
        Ok(())
    }

    /// Same as [`track_camera`](Self::track_camera), also returning the full
    /// per-iteration history of the frame.
    pub fn track_camera_with_debug(
        &mut self,
        state: &mut TrackingState,
        view: &View,
    ) -> Result<TrackingDebug> {
        let mut debug = TrackingDebug::new();
        self.track(state, view, Some(&mut debug))?;
        Ok(debug)
    }

    fn check_inputs(&self, state: &TrackingState, view: &View) -> Result<()> {
        let expected = self.image_size();
        let inputs = [
            ("live depth", view.depth.size()),
            ("reference points", state.point_cloud.locations.size()),
            ("reference normals", state.point_cloud.normals.size()),
        ];
        for (what, actual) in inputs {
            if actual != expected {
                return Err(TrackerError::ImageSizeMismatch {
                    what,
                    expected_width: expected.0,
                    expected_height: expected.1,
                    actual_width: actual.0,
                    actual_height: actual.1,
                }
                .into());
            }
        }
        Ok(())
    }

    fn track(
        &mut self,
        state: &mut TrackingState,
        view: &View,
        mut debug: Option<&mut TrackingDebug>,
    ) -> Result<QualityAssessment> {
        self.check_inputs(state, view)?;

        let total_timer = Timer::new("track_camera");
        if let Some(d) = debug.as_deref_mut() {
            d.set_initial_pose(&state.pose.m());
        }

        let prepare_timer = Timer::new("prepare");
        self.pyramid.bind(&view.depth, view.intrinsics);
        self.pyramid.prepare();
        let prepare_ms = measured_ms(&prepare_timer);

        let optimize_timer = Timer::new("optimize");
        let scene_pose = state.reference_pose.m();
        let scene_intrinsics = self.pyramid.scene_level(0).intrinsics;
        let evaluator = self.evaluator.as_ref();
        let mut accepted = AcceptedState::new();
        let mut total_evaluations = 0;

        for level in (0..self.pyramid.num_levels()).rev() {
            let view_level = self.pyramid.view_level(level);
            let params = LevelParams {
                iteration_type: view_level.iteration_type,
                max_iterations: self.schedule.iterations(level),
                termination_threshold: self.config.termination_threshold,
            };
            if params.iteration_type == IterationType::None {
                continue;
            }

            let input = EvaluationInput {
                depth: &view_level.depth,
                view_intrinsics: view_level.intrinsics,
                points: &state.point_cloud.locations,
                normals: &state.point_cloud.normals,
                scene_intrinsics,
                scene_pose,
                dist_threshold: self.schedule.threshold(level),
                iteration_type: params.iteration_type,
            };

            let mut level_debug = debug.is_some().then(|| {
                LevelDebug::new(
                    level,
                    params.iteration_type,
                    params.max_iterations,
                    input.dist_threshold,
                )
            });

            let level_timer = Timer::new("level");
            let summary = optimize_level(
                &mut state.pose,
                &mut accepted,
                &params,
                |inv: &Matrix4<f64>| evaluator.evaluate(&input, inv),
                level_debug.as_mut(),
            );
            total_evaluations += summary.iterations;

            debug!(
                pyramid_level = level,
                iteration_type = %params.iteration_type,
                status = ?summary.status,
                iterations = summary.iterations,
                accepted = summary.accepted,
                rejected = summary.rejected,
                lambda = summary.lambda,
                energy = accepted.energy,
                valid = accepted.valid_count,
                "ICP level finished"
            );

            if let (Some(d), Some(mut record)) = (debug.as_deref_mut(), level_debug) {
                record.elapsed_ms = measured_ms(&level_timer);
                d.levels.push(record);
            }
        }
        let optimize_ms = measured_ms(&optimize_timer);

        let quality_timer = Timer::new("quality");
        let max_valid_count = count_valid_depths(&self.pyramid.view_level(0).depth);
        let assessment = assess_quality(
            &QualityInput {
                energy: accepted.energy,
                valid_count: accepted.valid_count,
                max_valid_count,
                hessian: &accepted.hessian,
                dist_threshold: self.schedule.threshold(0) as f64,
                finest_iteration_type: self.pyramid.iteration_type(0),
            },
            &self.config.quality,
        );
        state.pose_quality = assessment.quality.score();
        let quality_ms = measured_ms(&quality_timer);

        debug!(
            evaluations = total_evaluations,
            valid = accepted.valid_count,
            max_valid = max_valid_count,
            residual = assessment.final_residual,
            inlier_ratio = assessment.inlier_ratio,
            determinant = ?assessment.determinant,
            quality = ?assessment.quality,
            "Tracked frame"
        );

        if let Some(d) = debug {
            d.set_final_pose(&state.pose.m());
            d.total_evaluations = total_evaluations;
            d.max_valid_count = max_valid_count;
            d.final_energy = accepted.energy;
            d.valid_count = accepted.valid_count;
            d.final_residual = assessment.final_residual;
            d.inlier_ratio = assessment.inlier_ratio;
            d.determinant = assessment.determinant;
            d.pose_quality = Some(assessment.quality);
            d.timing = PROFILING_ENABLED.then(|| TrackingTimingDebug {
                total_ms: total_timer.elapsed_ms(),
                prepare_ms: prepare_ms.unwrap_or_default(),
                optimize_ms: optimize_ms.unwrap_or_default(),
                quality_ms: quality_ms.unwrap_or_default(),
            });
        }

        Ok(assessment)
    }
}

/// Builder for [`DepthTracker`].
pub struct DepthTrackerBuilder {
    image_size: (usize, usize),
    config: TrackerConfig,
    expected_levels: Option<usize>,
    evaluator: Option<Box<dyn CorrespondenceEvaluator>>,
}

impl DepthTrackerBuilder {
    /// Create a new builder with default settings.
    pub fn new(image_size: (usize, usize)) -> Self {
        Self {
            image_size,
            config: TrackerConfig::default(),
            expected_levels: None,
            evaluator: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the per-level iteration types, finest first.
    pub fn levels(mut self, levels: Vec<IterationType>) -> Self {
        self.config.levels = levels;
        self
    }

    /// Require exactly `num_levels` iteration types at build time.
    pub fn num_levels(mut self, num_levels: usize) -> Self {
        self.expected_levels = Some(num_levels);
        self
    }

    /// Set the convergence threshold on `|step| / 6`.
    pub fn termination_threshold(mut self, threshold: f64) -> Self {
        self.config.termination_threshold = threshold;
        self
    }

    /// Set the coarse and fine iteration budgets.
    pub fn iteration_bounds(mut self, coarse: u32, fine: u32) -> Self {
        self.config.iterations = Some(Bounds::new(coarse, fine));
        self
    }

    /// Set the coarse and fine squared inlier distances.
    pub fn distance_thresholds(mut self, coarse: f32, fine: f32) -> Self {
        self.config.thresholds = Bounds::new(coarse, fine);
        self
    }

    pub fn backend(mut self, backend: EvaluatorBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn quality_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.config.quality = thresholds;
        self
    }

    /// Use a custom evaluator instead of the configured backend.
    pub fn evaluator(mut self, evaluator: Box<dyn CorrespondenceEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Build the tracker.
    pub fn build(self) -> Result<DepthTracker> {
        if let Some(expected) = self.expected_levels {
            let actual = self.config.num_levels();
            if actual != expected {
                return Err(TrackerError::LevelCountMismatch { expected, actual }.into());
            }
        }
        match self.evaluator {
            Some(evaluator) => DepthTracker::with_evaluator(self.image_size, self.config, evaluator),
            None => DepthTracker::new(self.image_size, self.config),
        }
    }
}
