//! Multi-resolution level records and their iteration schedule.

pub mod filter;
pub mod hierarchy;
pub mod schedule;

pub use filter::{count_valid_depths, filter_subsample_with_holes, DEPTH_HOLE};
pub use hierarchy::{SceneLevel, TrackingPyramid, ViewLevel};
pub use schedule::{
    default_iteration_bounds, default_threshold_bounds, interpolate_levels, Bounds, LevelSchedule,
    DEFAULT_COARSE_THRESHOLD, DEFAULT_FINE_ITERATIONS, DEFAULT_FINE_THRESHOLD,
};
