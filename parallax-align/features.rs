use crate::error::{AlignError, AlignResult, ImageRole};
use image::{imageops, RgbImage};
use parallax_brief::{BriefGenerator, HammingMatcher};
use parallax_core::{Descriptor, FeatureConfig, Keypoint, Match};
use parallax_fast::{FastDetector, FastError};

/// Keypoints of one image with one descriptor per keypoint
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// FAST keypoints + rotated BRIEF descriptors for a colour image
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    cfg: FeatureConfig,
    brief: BriefGenerator,
}

impl FeatureExtractor {
    pub fn new(cfg: FeatureConfig) -> AlignResult<Self> {
        FastDetector::validate_config(&cfg).map_err(|e| AlignError::InvalidConfig(e.to_string()))?;
        let brief = BriefGenerator::new(cfg.patch_size);
        Ok(Self { cfg, brief })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.cfg
    }

    /// Detect and describe features.
    ///
    /// Fails with `EmptyImage` for a zero-sized image and `NoFeaturesFound`
    /// when the detector finds no corner at any scale.
    pub fn extract(&self, img: &RgbImage, role: ImageRole) -> AlignResult<FeatureSet> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(AlignError::EmptyImage { role, width, height });
        }

        let gray = imageops::grayscale(img).into_raw();
        let detector = FastDetector::new(self.cfg.clone(), width as usize, height as usize)
            .map_err(|e| Self::detection_error(e, role, width, height))?;
        let detection = detector
            .detect(&gray)
            .map_err(|e| Self::detection_error(e, role, width, height))?;

        let descriptors = self.brief.generate_descriptors(&detection.pyramid, &detection.keypoints);
        log::debug!("{} image: {} features", role, detection.keypoints.len());

        Ok(FeatureSet {
            keypoints: detection.keypoints,
            descriptors,
        })
    }

    /// Like [`extract`](Self::extract), but a featureless image yields an empty set
    pub fn extract_or_empty(&self, img: &RgbImage, role: ImageRole) -> AlignResult<FeatureSet> {
        match self.extract(img, role) {
            Err(AlignError::NoFeaturesFound { .. }) => {
                log::warn!("no features found in {} image, continuing with an empty set", role);
                Ok(FeatureSet::empty())
            }
            other => other,
        }
    }

    fn detection_error(err: FastError, role: ImageRole, width: u32, height: u32) -> AlignError {
        match err {
            FastError::NoFeaturesFound { .. } => AlignError::NoFeaturesFound { role },
            FastError::InvalidImageSize { .. } => AlignError::EmptyImage { role, width, height },
            other => AlignError::InvalidConfig(other.to_string()),
        }
    }
}

/// Cross-checked matches between two feature sets, best first
pub fn match_features(
    reference: &FeatureSet,
    target: &FeatureSet,
    matcher: &HammingMatcher,
) -> AlignResult<Vec<Match>> {
    if reference.descriptors.is_empty() || target.descriptors.is_empty() {
        return Err(AlignError::InsufficientDescriptors {
            reference: reference.descriptors.len(),
            target: target.descriptors.len(),
        });
    }
    Ok(matcher.match_descriptors(&reference.descriptors, &target.descriptors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn blocks(width: u32, height: u32, seed: u64) -> RgbImage {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cols = width.div_ceil(8);
        let rows = height.div_ceil(8);
        let values: Vec<u8> = (0..cols * rows).map(|_| rng.random()).collect();
        RgbImage::from_fn(width, height, |x, y| {
            let v = values[((y / 8) * cols + x / 8) as usize];
            Rgb([v, v.wrapping_add(40), v])
        })
    }

    fn small_config() -> FeatureConfig {
        FeatureConfig {
            max_features: 400,
            n_levels: 3,
            ..FeatureConfig::default()
        }
    }

    #[test]
    fn test_empty_image_rejected() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let err = extractor.extract(&RgbImage::new(0, 10), ImageRole::Target).unwrap_err();
        assert!(matches!(err, AlignError::EmptyImage { role: ImageRole::Target, width: 0, height: 10 }));
    }

    #[test]
    fn test_uniform_image_has_no_features() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let flat = RgbImage::from_pixel(120, 90, Rgb([90, 90, 90]));

        let err = extractor.extract(&flat, ImageRole::Reference).unwrap_err();
        assert!(matches!(err, AlignError::NoFeaturesFound { role: ImageRole::Reference }));

        let soft = extractor.extract_or_empty(&flat, ImageRole::Reference).unwrap();
        assert!(soft.is_empty());
    }

    #[test]
    fn test_extraction_is_bounded_and_deterministic() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let img = blocks(200, 160, 11);

        let a = extractor.extract(&img, ImageRole::Reference).unwrap();
        let b = extractor.extract(&img, ImageRole::Reference).unwrap();

        assert!(!a.is_empty());
        assert!(a.len() <= 400);
        assert_eq!(a.descriptors.len(), a.len());
        assert_eq!(a.keypoints, b.keypoints);
        assert_eq!(a.descriptors, b.descriptors);
    }

    #[test]
    fn test_match_features_requires_descriptors() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let set = extractor.extract(&blocks(160, 120, 5), ImageRole::Reference).unwrap();

        let err = match_features(&set, &FeatureSet::empty(), &HammingMatcher::new()).unwrap_err();
        assert!(matches!(err, AlignError::InsufficientDescriptors { target: 0, .. }));

        let matches = match_features(&set, &set, &HammingMatcher::new()).unwrap();
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|m| m.distance == 0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = FeatureConfig {
            patch_size: 8,
            ..FeatureConfig::default()
        };
        assert!(matches!(FeatureExtractor::new(cfg), Err(AlignError::InvalidConfig(_))));
    }
}
