//! Rotated BRIEF descriptors and Hamming descriptor matching.

mod matcher;

pub use matcher::HammingMatcher;

use parallax_core::{Descriptor, Keypoint, PyramidLevel};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

const DESCRIPTOR_SIZE: usize = 32;
const N_TESTS: usize = DESCRIPTOR_SIZE * 8;

/// Seed of the sampling pattern; changing it invalidates every stored descriptor
const PATTERN_SEED: u64 = 0x0b5e_55ed_b41e_f000;

/// Binary test pair: (x1, y1, x2, y2) offsets from the keypoint
type TestPair = (i32, i32, i32, i32);

#[derive(Debug, Clone)]
pub struct BriefGenerator {
    pattern: Vec<TestPair>,
}

impl BriefGenerator {
    /// Build a generator whose test points lie in a disc fitting a `patch_size` window
    pub fn new(patch_size: usize) -> Self {
        assert!(patch_size >= 7, "patch size {} too small for BRIEF", patch_size);
        // Keep rotated samples inside the patch
        let radius = (patch_size / 2) as i32 - 2;
        Self {
            pattern: Self::generate_pattern(radius),
        }
    }

    /// Uniform pairs inside a disc, drawn from a fixed-seed generator so the
    /// pattern is identical in every process
    fn generate_pattern(radius: i32) -> Vec<TestPair> {
        let mut rng = ChaCha8Rng::seed_from_u64(PATTERN_SEED);
        let mut sample = move || loop {
            let x = rng.random_range(-radius..=radius);
            let y = rng.random_range(-radius..=radius);
            if x * x + y * y <= radius * radius {
                return (x, y);
            }
        };

        let mut pattern = Vec::with_capacity(N_TESTS);
        while pattern.len() < N_TESTS {
            let (x1, y1) = sample();
            let (x2, y2) = sample();
            if (x1, y1) != (x2, y2) {
                pattern.push((x1, y1, x2, y2));
            }
        }
        pattern
    }

    /// Compute one descriptor per keypoint, sampling the smoothed pyramid level it was detected on
    pub fn generate_descriptors(&self, pyramid: &[PyramidLevel], kps: &[Keypoint]) -> Vec<Descriptor> {
        kps.par_iter()
            .map(|kp| match pyramid.get(kp.octave) {
                Some(level) => self.describe(level, kp),
                None => [0u8; DESCRIPTOR_SIZE],
            })
            .collect()
    }

    fn describe(&self, level: &PyramidLevel, kp: &Keypoint) -> Descriptor {
        let (s, c) = kp.angle.sin_cos();
        let (cx, cy) = level.to_level(kp.x, kp.y);
        let mut d = [0u8; DESCRIPTOR_SIZE];

        for (i, &(dx1, dy1, dx2, dy2)) in self.pattern.iter().enumerate() {
            // Apply rotation and translation for subpixel coordinates
            let (rx1, ry1) = (
                cx + c * dx1 as f32 - s * dy1 as f32,
                cy + s * dx1 as f32 + c * dy1 as f32,
            );
            let (rx2, ry2) = (
                cx + c * dx2 as f32 - s * dy2 as f32,
                cy + s * dx2 as f32 + c * dy2 as f32,
            );

            let bit = (Self::sample(level, rx1, ry1) < Self::sample(level, rx2, ry2)) as u8;
            d[i / 8] |= bit << (i % 8);
        }
        d
    }

    /// Nearest-pixel sample of the smoothed level, clamped to the image bounds
    #[inline]
    fn sample(level: &PyramidLevel, x: f32, y: f32) -> u8 {
        let xi = x.round().clamp(0.0, (level.width - 1) as f32) as usize;
        let yi = y.round().clamp(0.0, (level.height - 1) as f32) as usize;
        level.smoothed[yi * level.width + xi]
    }
}
