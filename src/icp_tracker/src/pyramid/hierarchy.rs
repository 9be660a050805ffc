//! Pyramid level records for the live view and the reference scene.
//!
//! Level 0 of the view side holds the live depth frame; coarser levels are
//! rebuilt every frame by hole-aware subsampling into buffers allocated once
//! at construction. The scene side only tracks intrinsics: the reference
//! point and normal maps are not resampled, every level correlates against
//! the level-0 maps.

use crate::camera::Intrinsics;
use crate::error::{Result, TrackerError};
use crate::image::DepthImage;
use crate::optimization::IterationType;

use super::filter::{filter_subsample_with_holes, DEPTH_HOLE};

/// One resolution of the live depth pyramid.
#[derive(Debug, Clone)]
pub struct ViewLevel {
    pub depth: DepthImage,
    pub intrinsics: Intrinsics,
    pub iteration_type: IterationType,
}

/// One resolution of the reference side.
#[derive(Debug, Clone)]
pub struct SceneLevel {
    pub intrinsics: Intrinsics,
    pub iteration_type: IterationType,
}

/// View and scene level records, finest (0) to coarsest.
#[derive(Debug, Clone)]
pub struct TrackingPyramid {
    image_size: (usize, usize),
    view: Vec<ViewLevel>,
    scene: Vec<SceneLevel>,
}

impl TrackingPyramid {
    /// Allocate all levels for a full-resolution `image_size`.
    ///
    /// Level `i` has size `image_size / 2^i`. `iteration_types` is indexed
    /// finest first and its length sets the number of levels.
    pub fn new(image_size: (usize, usize), iteration_types: &[IterationType]) -> Result<Self> {
        let num_levels = iteration_types.len();
        if num_levels == 0 {
            return Err(TrackerError::NoLevels);
        }
        let (width, height) = image_size;
        let shift = (num_levels - 1) as u32;
        if num_levels > usize::BITS as usize
            || (width >> shift) == 0
            || (height >> shift) == 0
        {
            return Err(TrackerError::ImageTooSmall {
                width,
                height,
                levels: num_levels,
            });
        }

        let placeholder = Intrinsics::new(1.0, 1.0, 0.0, 0.0);
        let view = iteration_types
            .iter()
            .enumerate()
            .map(|(level, &iteration_type)| ViewLevel {
                depth: DepthImage::new(width >> level, height >> level, DEPTH_HOLE),
                intrinsics: placeholder,
                iteration_type,
            })
            .collect();
        let scene = iteration_types
            .iter()
            .map(|&iteration_type| SceneLevel {
                intrinsics: placeholder,
                iteration_type,
            })
            .collect();

        Ok(Self {
            image_size,
            view,
            scene,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.view.len()
    }

    /// Full-resolution `(width, height)`.
    pub fn image_size(&self) -> (usize, usize) {
        self.image_size
    }

    pub fn view_level(&self, level: usize) -> &ViewLevel {
        &self.view[level]
    }

    pub fn scene_level(&self, level: usize) -> &SceneLevel {
        &self.scene[level]
    }

    pub fn iteration_type(&self, level: usize) -> IterationType {
        self.view[level].iteration_type
    }

    /// Bind the live depth frame and calibration to level 0.
    ///
    /// The depth is copied into the level-0 buffer; the caller has checked
    /// that it matches `image_size`.
    pub fn bind(&mut self, depth: &DepthImage, intrinsics: Intrinsics) {
        self.view[0].depth.copy_from(depth);
        self.view[0].intrinsics = intrinsics;
        self.scene[0].intrinsics = intrinsics;
    }

    /// Rebuild levels `1..N` from level 0.
    pub fn prepare(&mut self) {
        for level in 1..self.view.len() {
            let (finer, coarser) = self.view.split_at_mut(level);
            let previous = &finer[level - 1];
            let current = &mut coarser[0];
            filter_subsample_with_holes(&mut current.depth, &previous.depth);
            current.intrinsics = previous.intrinsics.halved();

            self.scene[level].intrinsics = self.scene[level - 1].intrinsics.halved();
        }
    }
}
