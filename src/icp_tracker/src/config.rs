//! Tracker configuration.
//!
//! A [`TrackerConfig`] can be built in code, deserialized from JSON, or
//! parsed from the compact description string used by depth-fusion front
//! ends:
//!
//! ```text
//! type=icp,levels=rrrbb,minstep=1e-3,outlierC=0.01,outlierF=0.002,numiterC=10,numiterF=2
//! ```
//!
//! Level codes are listed coarsest first: `b` (rotation and translation),
//! `r` (rotation only), `t` (translation only), `n` (skip).

use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::evaluation::EvaluatorBackend;
use crate::optimization::IterationType;
use crate::pyramid::{default_iteration_bounds, default_threshold_bounds, Bounds, LevelSchedule};
use crate::scoring::QualityThresholds;

/// Default convergence threshold on `|step| / 6`.
pub const DEFAULT_TERMINATION_THRESHOLD: f64 = 1e-3;

/// Full configuration of a [`DepthTracker`](crate::DepthTracker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Iteration type per pyramid level, finest first.
    pub levels: Vec<IterationType>,

    /// Convergence threshold on `|step| / 6`.
    pub termination_threshold: f64,

    /// Coarse and fine iteration budgets. `None` uses `2 * levels` and 2.
    pub iterations: Option<Bounds<u32>>,

    /// Coarse and fine squared inlier distances (m²).
    pub thresholds: Bounds<f32>,

    pub backend: EvaluatorBackend,

    pub quality: QualityThresholds,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            levels: vec![
                IterationType::Both,
                IterationType::Both,
                IterationType::RotationOnly,
                IterationType::RotationOnly,
                IterationType::RotationOnly,
            ],
            termination_threshold: DEFAULT_TERMINATION_THRESHOLD,
            iterations: None,
            thresholds: default_threshold_bounds(),
            backend: EvaluatorBackend::default(),
            quality: QualityThresholds::default(),
        }
    }
}

impl TrackerConfig {
    /// Configuration with the given per-level iteration types (finest
    /// first) and default everything else.
    pub fn with_levels(levels: Vec<IterationType>) -> Self {
        Self {
            levels,
            ..Default::default()
        }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Effective iteration bounds.
    pub fn iteration_bounds(&self) -> Bounds<u32> {
        self.iterations
            .unwrap_or_else(|| default_iteration_bounds(self.num_levels()))
    }

    /// Iteration type of the finest level.
    pub fn finest_iteration_type(&self) -> Option<IterationType> {
        self.levels.first().copied()
    }

    /// Check every field. Called by the tracker before allocating anything.
    pub fn validate(&self) -> Result<()> {
        if self.levels.is_empty() {
            return Err(TrackerError::NoLevels);
        }
        if !self.termination_threshold.is_finite() || self.termination_threshold <= 0.0 {
            return Err(TrackerError::InvalidTerminationThreshold(
                self.termination_threshold,
            ));
        }
        LevelSchedule::new(self.num_levels(), self.iteration_bounds(), self.thresholds)?;
        self.quality.validate()
    }

    /// Build the level schedule described by this configuration.
    pub fn schedule(&self) -> Result<LevelSchedule> {
        LevelSchedule::new(self.num_levels(), self.iteration_bounds(), self.thresholds)
    }

    /// Load and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: TrackerConfig =
            serde_json::from_str(json).context("Failed to parse tracker configuration JSON")?;
        config
            .validate()
            .context("Invalid tracker configuration")?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl FromStr for TrackerConfig {
    type Err = TrackerError;

    /// Parse the compact `key=value,...` description.
    ///
    /// Keys not present keep their defaults; unknown keys are rejected.
    fn from_str(s: &str) -> Result<Self> {
        let mut config = TrackerConfig::default();
        let mut coarse_iterations = None;
        let mut fine_iterations = None;

        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| TrackerError::Parse(format!("expected key=value, got '{entry}'")))?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "type" => {
                    if value != "icp" {
                        return Err(TrackerError::Parse(format!(
                            "unsupported tracker type '{value}'"
                        )));
                    }
                }
                "levels" => config.levels = parse_levels(value)?,
                "minstep" => config.termination_threshold = parse_number(key, value)?,
                "outlierC" => config.thresholds.coarse = parse_number(key, value)?,
                "outlierF" => config.thresholds.fine = parse_number(key, value)?,
                "numiterC" => coarse_iterations = Some(parse_number(key, value)?),
                "numiterF" => fine_iterations = Some(parse_number(key, value)?),
                _ => return Err(TrackerError::Parse(format!("unknown key '{key}'"))),
            }
        }

        if coarse_iterations.is_some() || fine_iterations.is_some() {
            let defaults = default_iteration_bounds(config.num_levels());
            config.iterations = Some(Bounds::new(
                coarse_iterations.unwrap_or(defaults.coarse),
                fine_iterations.unwrap_or(defaults.fine),
            ));
        }

        config.validate()?;
        Ok(config)
    }
}

impl fmt::Display for TrackerConfig {
    /// Format as the compact description accepted by [`FromStr`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let levels: String = self.levels.iter().rev().map(IterationType::code).collect();
        let iterations = self.iteration_bounds();
        write!(
            f,
            "type=icp,levels={},minstep={},outlierC={},outlierF={},numiterC={},numiterF={}",
            levels,
            self.termination_threshold,
            self.thresholds.coarse,
            self.thresholds.fine,
            iterations.coarse,
            iterations.fine,
        )
    }
}

/// Parse level codes given coarsest first into a finest-first list.
fn parse_levels(value: &str) -> Result<Vec<IterationType>> {
    let mut levels = value
        .chars()
        .map(|c| {
            IterationType::from_code(c)
                .ok_or_else(|| TrackerError::Parse(format!("unknown level code '{c}'")))
        })
        .collect::<Result<Vec<_>>>()?;
    if levels.is_empty() {
        return Err(TrackerError::NoLevels);
    }
    levels.reverse();
    Ok(levels)
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| TrackerError::Parse(format!("invalid value '{value}' for '{key}'")))
}
