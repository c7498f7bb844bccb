//! Spacing resolution for in-plane resampling
//!
//! Volumes are resampled to the configured spacing in-plane while axes set to
//! the -1.0 sentinel keep their original resolution, which avoids resampling
//! the low-resolution through-plane direction.

use fbs_config::SPACING_SENTINEL;
use serde::Serialize;

/// Target voxel spacing, possibly preserving some original axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetSpacing {
    spacing: [f64; 3],
}

impl TargetSpacing {
    pub fn new(spacing: [f64; 3]) -> Self {
        Self { spacing }
    }

    /// Configured spacing, sentinels included
    pub fn as_array(&self) -> [f64; 3] {
        self.spacing
    }

    /// Whether `axis` keeps the spacing of the input image
    pub fn preserves_axis(&self, axis: usize) -> bool {
        self.spacing[axis] == SPACING_SENTINEL
    }

    /// In-plane part of the spacing (first two axes)
    pub fn inplane(&self) -> [f64; 2] {
        [self.spacing[0], self.spacing[1]]
    }

    /// Spacing an image with `original` spacing is resampled to
    pub fn resolve(&self, original: [f64; 3]) -> [f64; 3] {
        let mut resolved = self.spacing;
        for (axis, value) in resolved.iter_mut().enumerate() {
            if *value == SPACING_SENTINEL {
                *value = original[axis];
            }
        }
        resolved
    }

    /// Per-axis zoom factor (original / target) applied when resampling
    pub fn zoom(&self, original: [f64; 3]) -> [f64; 3] {
        let target = self.resolve(original);
        [
            original[0] / target[0],
            original[1] / target[1],
            original[2] / target[2],
        ]
    }
}
