//! Network topology derivation
//!
//! Derives per-level convolution kernels and strides for the 2D dynamic U-Net
//! from the patch size and in-plane spacing, following the nnU-Net empirical
//! rules: downsample an axis while it is not much coarser than the finest axis
//! and still at least 8 voxels wide.

use fbs_config::SPACING_SENTINEL;
use serde::Serialize;

/// Axes narrower than this stop being downsampled
const MIN_DOWNSAMPLE_SIZE: f64 = 8.0;

/// Axes coarser than this multiple of the finest spacing are not downsampled
const MAX_SPACING_RATIO: f64 = 2.0;

/// Kernel sizes and strides for each level of the encoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    /// Convolution kernel per level, one entry per in-plane axis
    pub kernels: Vec<[u32; 2]>,
    /// Stride per level; the first level always has stride 1
    pub strides: Vec<[u32; 2]>,
}

impl Topology {
    /// Derive the topology for a patch of `inplane_size` voxels at `inplane_spacing` mm
    ///
    /// Sentinel (-1.0) spacing components carry no physical size, so they are
    /// treated as equal to the other axis, or as 1.0 when both are sentinels.
    pub fn derive(inplane_size: [u32; 2], inplane_spacing: [f64; 2]) -> Self {
        let mut spacings = effective_spacing(inplane_spacing);
        let mut sizes = [inplane_size[0] as f64, inplane_size[1] as f64];

        let mut kernels = Vec::new();
        let mut strides = vec![[1, 1]];

        loop {
            let finest = spacings[0].min(spacings[1]);
            let ratios = [spacings[0] / finest, spacings[1] / finest];

            let stride = [0usize, 1].map(|axis| {
                if ratios[axis] <= MAX_SPACING_RATIO && sizes[axis] >= MIN_DOWNSAMPLE_SIZE {
                    2
                } else {
                    1
                }
            });
            let kernel = [0usize, 1].map(|axis| if ratios[axis] <= MAX_SPACING_RATIO { 3 } else { 1 });

            if stride == [1, 1] {
                break;
            }

            for axis in 0..2 {
                sizes[axis] /= stride[axis] as f64;
                spacings[axis] *= stride[axis] as f64;
            }
            kernels.push(kernel);
            strides.push(stride);
        }

        kernels.push([3, 3]);

        Self { kernels, strides }
    }

    /// Number of resolution levels
    pub fn depth(&self) -> usize {
        self.strides.len()
    }

    /// Transposed convolution kernels of the decoder
    pub fn upsample_kernel_sizes(&self) -> &[[u32; 2]] {
        &self.strides[1..]
    }

    /// Total downsampling per axis: the product of all strides
    pub fn downsampling_factor(&self) -> [u32; 2] {
        self.strides
            .iter()
            .fold([1, 1], |acc, s| [acc[0] * s[0], acc[1] * s[1]])
    }

    /// Whether each axis of `inplane_size` is a multiple of the downsampling factor
    pub fn divides(&self, inplane_size: [u32; 2]) -> [bool; 2] {
        let factor = self.downsampling_factor();
        [
            inplane_size[0] % factor[0] == 0,
            inplane_size[1] % factor[1] == 0,
        ]
    }
}

fn effective_spacing(spacing: [f64; 2]) -> [f64; 2] {
    let sentinel = |v: f64| v == SPACING_SENTINEL;
    match (sentinel(spacing[0]), sentinel(spacing[1])) {
        (false, false) => spacing,
        (true, false) => [spacing[1], spacing[1]],
        (false, true) => [spacing[0], spacing[0]],
        (true, true) => [1.0, 1.0],
    }
}
