use parallax_core::{FeatureConfig, Keypoint, Plane, PyramidLevel};
use crate::corner_detection::CornerDetector;
use crate::error::{FastError, FastResult};
use crate::pyramid::ImagePyramid;
use crate::refinement::KeypointRefinement;
use crate::types::ScaleLevel;
use rayon::prelude::*;

/// Keypoints of one image together with the pyramid they were detected on
#[derive(Debug, Clone)]
pub struct Detection {
    pub keypoints: Vec<Keypoint>,
    pub pyramid: Vec<PyramidLevel>,
}

/// Multi-scale FAST detector bound to one image size
#[derive(Debug, Clone)]
pub struct FastDetector {
    cfg: FeatureConfig,
    w: usize,
    h: usize,
    scale_levels: Vec<ScaleLevel>,
}

impl FastDetector {
    /// Creates a new FAST detector with validation
    pub fn new(cfg: FeatureConfig, width: usize, height: usize) -> FastResult<Self> {
        if width == 0 || height == 0 {
            return Err(FastError::InvalidImageSize { width, height });
        }
        Self::validate_config(&cfg)?;

        // A level must leave at least one pixel inside the edge band
        let min_size = 2 * cfg.edge_threshold + 1;
        let scale_levels =
            ImagePyramid::generate_scale_levels(width, height, cfg.n_levels, cfg.scale_factor, min_size);

        Ok(Self {
            cfg,
            w: width,
            h: height,
            scale_levels,
        })
    }

    /// Check detector parameters independently of any image
    pub fn validate_config(cfg: &FeatureConfig) -> FastResult<()> {
        // 0 would detect everything, >127 overflows the u8 comparison range
        if cfg.fast_threshold == 0 || cfg.fast_threshold > 127 {
            return Err(FastError::InvalidThreshold(cfg.fast_threshold));
        }
        if cfg.patch_size % 2 == 0 || cfg.patch_size < 7 {
            return Err(FastError::InvalidPatchSize(cfg.patch_size));
        }
        let half_patch = cfg.patch_size / 2;
        if cfg.edge_threshold < half_patch {
            return Err(FastError::InvalidEdgeThreshold {
                edge_threshold: cfg.edge_threshold,
                half_patch,
            });
        }
        if cfg.n_levels == 0 || !(cfg.scale_factor > 1.0 && cfg.scale_factor.is_finite()) {
            return Err(FastError::InvalidPyramid {
                n_levels: cfg.n_levels,
                scale_factor: cfg.scale_factor,
            });
        }
        if cfg.max_features == 0 {
            return Err(FastError::InvalidFeatureBudget);
        }
        Ok(())
    }

    /// Validates image data before processing
    fn validate_image(&self, img: &Plane) -> FastResult<()> {
        let expected_len = self.w * self.h;
        if img.len() != expected_len {
            return Err(FastError::InvalidImageData {
                expected_len,
                actual_len: img.len(),
            });
        }
        Ok(())
    }

    /// Detect keypoints across all pyramid levels.
    ///
    /// Returns `NoFeaturesFound` when no level produces a corner, e.g. for a
    /// uniform image or one smaller than the edge band.
    pub fn detect(&self, img: &Plane) -> FastResult<Detection> {
        self.validate_image(img)?;

        let pyramid = ImagePyramid::build_image_pyramid(img, self.w, self.h, &self.scale_levels);

        let per_level: Vec<Vec<Keypoint>> = pyramid
            .par_iter()
            .map(|level| self.detect_at_level(level))
            .collect();

        let mut keypoints: Vec<Keypoint> = per_level.into_iter().flatten().collect();
        let candidates = keypoints.len();
        KeypointRefinement::retain_best(&mut keypoints, self.cfg.max_features);

        log::debug!(
            "FAST: {} levels, {} candidates, {} retained ({}x{})",
            pyramid.len(),
            candidates,
            keypoints.len(),
            self.w,
            self.h
        );

        if keypoints.is_empty() {
            return Err(FastError::NoFeaturesFound {
                width: self.w,
                height: self.h,
            });
        }

        Ok(Detection { keypoints, pyramid })
    }

    /// Detect keypoints only, discarding the pyramid
    pub fn detect_keypoints(&self, img: &Plane) -> FastResult<Vec<Keypoint>> {
        self.detect(img).map(|d| d.keypoints)
    }

    /// Detect, refine and orient keypoints on a single pyramid level
    fn detect_at_level(&self, level: &PyramidLevel) -> Vec<Keypoint> {
        let border = self.cfg.edge_threshold;
        let responses = CornerDetector::response_map(
            &level.plane,
            level.width,
            level.height,
            self.cfg.fast_threshold,
            border,
        );
        let corners = CornerDetector::non_maximum_suppression(&responses, level.width, level.height, border);

        corners
            .iter()
            .map(|corner| {
                let (lx, ly) = KeypointRefinement::refine_subpixel(&responses, level.width, level.height, corner);
                let angle = KeypointRefinement::compute_orientation(
                    &level.plane,
                    level.width,
                    level.height,
                    corner.x,
                    corner.y,
                    self.cfg.patch_size,
                );
                let (x, y) = level.to_base(lx, ly);
                Keypoint {
                    x,
                    y,
                    angle,
                    octave: level.octave,
                    response: corner.response,
                }
            })
            .collect()
    }

    /// Get scale levels for this detector
    pub fn scale_levels(&self) -> &[ScaleLevel] {
        &self.scale_levels
    }

    /// Get detector configuration
    pub fn config(&self) -> &FeatureConfig {
        &self.cfg
    }

    /// Get image dimensions
    pub fn dimensions(&self) -> (usize, usize) {
        (self.w, self.h)
    }
}
