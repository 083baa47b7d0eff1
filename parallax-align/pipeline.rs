//! Reference/target alignment and side-by-side combination.
//!
//! Stages run strictly in sequence: extract → match → estimate → warp →
//! crop → composite. Every run owns its buffers; a `Combiner` only holds
//! configuration and can be shared across threads.

use crate::composite::compose_side_by_side;
use crate::config::AlignConfig;
use crate::crop::crop;
use crate::error::{AlignError, AlignResult, ImageRole};
use crate::features::{match_features, FeatureExtractor, FeatureSet};
use crate::motion::{point_pairs, MotionEstimate, MotionEstimator};
use crate::output::write_atomic;
use crate::warp::warp;
use image::RgbImage;
use parallax_brief::HammingMatcher;
use parallax_core::Match;
use std::path::Path;
use std::time::Instant;

/// Registration of a target image onto a reference image
#[derive(Debug, Clone)]
pub struct Alignment {
    pub estimate: MotionEstimate,
    pub matches: Vec<Match>,
    pub reference_features: FeatureSet,
    pub target_features: FeatureSet,
    /// Target resampled onto the reference grid
    pub warped: RgbImage,
}

/// Final composite together with the alignment it was built from
#[derive(Debug, Clone)]
pub struct Combination {
    pub composite: RgbImage,
    pub estimate: MotionEstimate,
    pub num_matches: usize,
}

#[derive(Debug, Clone)]
pub struct Combiner {
    config: AlignConfig,
    extractor: FeatureExtractor,
    matcher: HammingMatcher,
    estimator: MotionEstimator,
}

impl Combiner {
    pub fn new(config: AlignConfig) -> AlignResult<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.features.clone())?;
        let matcher = HammingMatcher::new().with_max_matches(config.max_matches);
        let estimator = MotionEstimator::from_config(&config);
        Ok(Self {
            config,
            extractor,
            matcher,
            estimator,
        })
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Estimate the target → reference motion and warp the target onto the reference grid
    pub fn align(&self, reference: &RgbImage, target: &RgbImage) -> AlignResult<Alignment> {
        check_not_empty(reference, ImageRole::Reference)?;
        check_not_empty(target, ImageRole::Target)?;

        let start = Instant::now();
        let reference_features = self.extractor.extract_or_empty(reference, ImageRole::Reference)?;
        let target_features = self.extractor.extract_or_empty(target, ImageRole::Target)?;
        log::debug!(
            "features: reference {}, target {} ({:.1?})",
            reference_features.len(),
            target_features.len(),
            start.elapsed()
        );

        let stage = Instant::now();
        let matches = match_features(&reference_features, &target_features, &self.matcher)?;
        log::debug!("matches: {} ({:.1?})", matches.len(), stage.elapsed());

        let stage = Instant::now();
        let pairs = point_pairs(&matches, &reference_features.keypoints, &target_features.keypoints);
        let estimate = self.estimator.estimate(&pairs)?;
        log::debug!(
            "motion: {}/{} inliers, residual {:.3} px ({:.1?})",
            estimate.num_inliers,
            pairs.len(),
            estimate.residual,
            stage.elapsed()
        );

        let (width, height) = reference.dimensions();
        let warped = warp(target, &estimate.model, width, height)?;

        Ok(Alignment {
            estimate,
            matches,
            reference_features,
            target_features,
            warped,
        })
    }

    /// Align, crop both images with the configured crop and place them side by side
    pub fn combine_detailed(&self, reference: &RgbImage, target: &RgbImage) -> AlignResult<Combination> {
        check_not_empty(reference, ImageRole::Reference)?;
        check_not_empty(target, ImageRole::Target)?;
        // Reject an unusable crop before spending time on alignment
        let (width, height) = reference.dimensions();
        self.config.crop.validate(width, height)?;

        let start = Instant::now();
        let alignment = self.align(reference, target)?;

        let left = crop(reference, self.config.crop)?;
        let right = crop(&alignment.warped, self.config.crop)?;
        let composite = compose_side_by_side(&left, &right)?;

        let (tx, ty) = alignment.estimate.model.translation();
        log::info!(
            "combined {}x{} composite: shift ({:.2}, {:.2}), rotation {:.4} rad, scale {:.4}, {}/{} inliers in {:.1?}",
            composite.width(),
            composite.height(),
            tx,
            ty,
            alignment.estimate.model.rotation(),
            alignment.estimate.model.scale(),
            alignment.estimate.num_inliers,
            alignment.matches.len(),
            start.elapsed()
        );

        Ok(Combination {
            composite,
            num_matches: alignment.matches.len(),
            estimate: alignment.estimate,
        })
    }

    pub fn combine(&self, reference: &RgbImage, target: &RgbImage) -> AlignResult<RgbImage> {
        self.combine_detailed(reference, target).map(|c| c.composite)
    }

    /// Combine and write the composite to `dest`; nothing is written unless every stage succeeds
    pub fn combine_to_path(&self, reference: &RgbImage, target: &RgbImage, dest: &Path) -> AlignResult<Combination> {
        let combination = self.combine_detailed(reference, target)?;
        write_atomic(&combination.composite, dest, self.config.jpeg_quality)?;
        log::info!("saved combined image to {}", dest.display());
        Ok(combination)
    }
}

fn check_not_empty(img: &RgbImage, role: ImageRole) -> AlignResult<()> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(AlignError::EmptyImage { role, width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::CropSpec;
    use image::Rgb;

    #[test]
    fn test_new_rejects_invalid_config() {
        let cfg = AlignConfig::default().with_ransac_threshold(-1.0);
        assert!(matches!(Combiner::new(cfg), Err(AlignError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_images_fail_fast() {
        let combiner = Combiner::new(AlignConfig::default()).unwrap();
        let img = RgbImage::from_pixel(20, 20, Rgb([1, 2, 3]));

        let err = combiner.combine(&RgbImage::new(0, 0), &img).unwrap_err();
        assert!(matches!(err, AlignError::EmptyImage { role: ImageRole::Reference, .. }));

        let err = combiner.align(&img, &RgbImage::new(20, 0)).unwrap_err();
        assert!(matches!(err, AlignError::EmptyImage { role: ImageRole::Target, .. }));
    }

    #[test]
    fn test_crop_checked_before_alignment() {
        let combiner = Combiner::new(AlignConfig::default().with_crop(CropSpec::new(30, 0))).unwrap();
        // Uniform images would fail alignment; the crop error must come first
        let img = RgbImage::from_pixel(30, 20, Rgb([7, 7, 7]));
        assert!(matches!(
            combiner.combine(&img, &img),
            Err(AlignError::InvalidCrop { left: 30, width: 30, .. })
        ));
    }

    #[test]
    fn test_featureless_images_fail_at_matching() {
        let combiner = Combiner::new(AlignConfig::default()).unwrap();
        let img = RgbImage::from_pixel(64, 64, Rgb([128, 128, 128]));
        assert!(matches!(
            combiner.align(&img, &img),
            Err(AlignError::InsufficientDescriptors { reference: 0, target: 0 })
        ));
    }
}
