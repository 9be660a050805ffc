//! Per-frame inputs and the caller-owned tracking state.

use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

use crate::camera::Intrinsics;
use crate::image::{DepthImage, PointMap};
use crate::pose::Se3Pose;

/// Live depth frame with its calibration.
#[derive(Debug, Clone)]
pub struct View {
    /// Depth in meters, `<= 0` for missing measurements.
    pub depth: DepthImage,
    /// Depth camera intrinsics at full resolution.
    pub intrinsics: Intrinsics,
}

/// Reference surface rendered from the current model.
#[derive(Debug, Clone)]
pub struct PointCloud {
    /// World-space surface points, `w < 0` for holes.
    pub locations: PointMap,
    /// World-space unit normals matching `locations`.
    pub normals: PointMap,
}

impl PointCloud {
    /// An all-hole point cloud of the given size.
    pub fn empty(width: usize, height: usize) -> Self {
        let hole = Vector4::new(0.0, 0.0, 0.0, -1.0);
        Self {
            locations: PointMap::new(width, height, hole),
            normals: PointMap::new(width, height, hole),
        }
    }
}

/// Discrete tracking confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseQuality {
    Failed,
    Poor,
    Good,
}

impl PoseQuality {
    /// Scalar confidence consumed by fusion: 0.0, 0.5 or 1.0.
    pub fn score(&self) -> f32 {
        match self {
            PoseQuality::Failed => 0.0,
            PoseQuality::Poor => 0.5,
            PoseQuality::Good => 1.0,
        }
    }

    /// Nearest level for a scalar score.
    pub fn from_score(score: f32) -> Self {
        if score >= 0.75 {
            PoseQuality::Good
        } else if score >= 0.25 {
            PoseQuality::Poor
        } else {
            PoseQuality::Failed
        }
    }
}

/// Tracking state owned by the caller and updated by the tracker.
#[derive(Debug, Clone)]
pub struct TrackingState {
    /// Current depth camera pose (world-to-camera). Refined in place.
    pub pose: Se3Pose,
    /// Pose the reference point cloud was rendered from.
    pub reference_pose: Se3Pose,
    /// Reference point and normal maps.
    pub point_cloud: PointCloud,
    /// Confidence of the last tracked pose: 0.0, 0.5 or 1.0.
    pub pose_quality: f32,
}

impl TrackingState {
    pub fn new(point_cloud: PointCloud) -> Self {
        Self {
            pose: Se3Pose::identity(),
            reference_pose: Se3Pose::identity(),
            point_cloud,
            pose_quality: 0.0,
        }
    }

    pub fn quality(&self) -> PoseQuality {
        PoseQuality::from_score(self.pose_quality)
    }
}
