#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row-major 8-bit luminance plane
pub type Plane = Vec<u8>;

/// Key-point ≙ FAST corner + orientation (radians), full-resolution coordinates with subpixel precision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32, // Subpixel x coordinate
    pub y: f32, // Subpixel y coordinate
    pub angle: f32,
    /// Pyramid level the corner was detected on
    pub octave: usize,
    pub response: f32,
}

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

/// Number of bits set in `a ^ b`
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Cross-image correspondence between a reference and a target keypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Match {
    pub reference: usize,
    pub target: usize,
    pub distance: u32,
}

impl Match {
    /// Same correspondence with the two index roles exchanged
    pub fn swapped(self) -> Self {
        Self {
            reference: self.target,
            target: self.reference,
            distance: self.distance,
        }
    }
}

/// One level of the scale pyramid.
///
/// `plane` is used for corner detection and orientation, `smoothed` for
/// descriptor sampling. `scale_x`/`scale_y` are the exact ratios between
/// the base image and this level.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub octave: usize,
    pub scale: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: usize,
    pub height: usize,
    pub plane: Plane,
    pub smoothed: Plane,
}

impl PyramidLevel {
    /// Map a level pixel coordinate to base image coordinates
    #[inline]
    pub fn to_base(&self, x: f32, y: f32) -> (f32, f32) {
        ((x + 0.5) * self.scale_x - 0.5, (y + 0.5) * self.scale_y - 0.5)
    }

    /// Map a base image coordinate into this level
    #[inline]
    pub fn to_level(&self, x: f32, y: f32) -> (f32, f32) {
        ((x + 0.5) / self.scale_x - 0.5, (y + 0.5) / self.scale_y - 0.5)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FeatureConfig {
    pub fast_threshold: u8,
    pub patch_size: usize,
    /// Keypoints closer than this to a level border are discarded
    pub edge_threshold: usize,
    pub n_levels: usize,
    pub scale_factor: f32,
    pub max_features: usize,
    pub n_threads: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            patch_size: 31,
            edge_threshold: 19,
            n_levels: 8,
            scale_factor: 1.2,
            max_features: 5000,
            n_threads: num_cpus::get().max(1),
        }
    }
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
