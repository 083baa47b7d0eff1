use crate::crop::CropSpec;
use crate::error::{AlignError, AlignResult};
use parallax_core::FeatureConfig;
use parallax_fast::FastDetector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AlignConfig {
    /// Keep only the best N matches; `None` uses every cross-checked match
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max_matches: Option<usize>,
    /// Inlier reprojection threshold in pixels
    pub ransac_threshold: f64,
    pub max_iterations: usize,
    pub confidence: f64,
    pub refine_iterations: usize,
    /// Estimates supported by a smaller share of the matches are rejected
    pub min_inlier_ratio: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub ransac_seed: u64,
    pub jpeg_quality: u8,
    /// Band removed from both images before compositing
    pub crop: CropSpec,
    /// Keypoint detection and description
    pub features: FeatureConfig,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            max_matches: None,
            ransac_threshold: 3.0,
            max_iterations: 2000,
            confidence: 0.99,
            refine_iterations: 10,
            min_inlier_ratio: 0.25,
            min_scale: 0.5,
            max_scale: 2.0,
            ransac_seed: 0x5eed,
            jpeg_quality: 95,
            crop: CropSpec::default(),
            features: FeatureConfig::default(),
        }
    }
}

impl AlignConfig {
    pub fn with_crop(mut self, crop: CropSpec) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.features.max_features = max_features;
        self
    }

    pub fn with_max_matches(mut self, max_matches: Option<usize>) -> Self {
        self.max_matches = max_matches;
        self
    }

    pub fn with_ransac_threshold(mut self, threshold: f64) -> Self {
        self.ransac_threshold = threshold;
        self
    }

    pub fn with_min_inlier_ratio(mut self, ratio: f64) -> Self {
        self.min_inlier_ratio = ratio;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.ransac_seed = seed;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> AlignResult<()> {
        FastDetector::validate_config(&self.features).map_err(|e| AlignError::InvalidConfig(e.to_string()))?;

        let invalid = |msg: String| Err(AlignError::InvalidConfig(msg));

        if !(self.ransac_threshold > 0.0 && self.ransac_threshold.is_finite()) {
            return invalid(format!("ransac_threshold must be positive, got {}", self.ransac_threshold));
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be at least 1".to_string());
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return invalid(format!("confidence must be in (0, 1), got {}", self.confidence));
        }
        if !(self.min_inlier_ratio > 0.0 && self.min_inlier_ratio <= 1.0) {
            return invalid(format!("min_inlier_ratio must be in (0, 1], got {}", self.min_inlier_ratio));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= 1.0 && self.max_scale >= 1.0 && self.max_scale.is_finite()) {
            return invalid(format!(
                "scale range [{}, {}] must contain 1 and be positive",
                self.min_scale, self.max_scale
            ));
        }
        if self.max_matches == Some(0) {
            return invalid("max_matches must be at least 1 when set".to_string());
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return invalid(format!("jpeg_quality must be 1-100, got {}", self.jpeg_quality));
        }
        Ok(())
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "AlignConfig: crop=({}, {}), max_features={}, fast_threshold={}, levels={}, ransac_threshold={}, min_inlier_ratio={}",
            self.crop.left,
            self.crop.bottom,
            self.features.max_features,
            self.features.fast_threshold,
            self.features.n_levels,
            self.ransac_threshold,
            self.min_inlier_ratio
        )
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> AlignResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    #[cfg(feature = "serde")]
    pub fn from_toml(content: &str) -> AlignResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| AlignError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> AlignResult<String> {
        toml::to_string_pretty(self).map_err(|e| AlignError::InvalidConfig(e.to_string()))
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> AlignResult<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> AlignResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| AlignError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> AlignResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| AlignError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AlignConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let cfg = AlignConfig::default()
            .with_crop(CropSpec::new(200, 60))
            .with_max_features(1200)
            .with_seed(7)
            .with_min_inlier_ratio(0.4);

        assert_eq!(cfg.crop, CropSpec::new(200, 60));
        assert_eq!(cfg.features.max_features, 1200);
        assert_eq!(cfg.ransac_seed, 7);
        assert!(cfg.validate().is_ok());
        assert!(cfg.summary().contains("crop=(200, 60)"));
    }

    #[test]
    fn test_with_features_replaces_detector_settings() {
        let features = FeatureConfig {
            fast_threshold: 30,
            n_levels: 4,
            max_features: 800,
            ..FeatureConfig::default()
        };
        let cfg = AlignConfig::default().with_features(features.clone());

        assert_eq!(cfg.features, features);
        assert!(cfg.validate().is_ok());

        let broken = AlignConfig::default().with_features(FeatureConfig { n_levels: 0, ..FeatureConfig::default() });
        assert!(matches!(broken.validate(), Err(AlignError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad = [
            AlignConfig::default().with_ransac_threshold(0.0),
            AlignConfig::default().with_min_inlier_ratio(0.0),
            AlignConfig::default().with_min_inlier_ratio(1.5),
            AlignConfig::default().with_max_matches(Some(0)),
            AlignConfig::default().with_jpeg_quality(0),
            AlignConfig::default().with_max_features(0),
            AlignConfig { min_scale: 1.2, ..AlignConfig::default() },
            AlignConfig { confidence: 1.0, ..AlignConfig::default() },
        ];
        for cfg in &bad {
            assert!(matches!(cfg.validate(), Err(AlignError::InvalidConfig(_))), "{:?}", cfg);
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_partial_file_uses_defaults() {
        let cfg = AlignConfig::from_toml(
            r#"
            ransac_threshold = 2.5

            [crop]
            left = 200
            bottom = 60

            [features]
            max_features = 3000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.crop, CropSpec::new(200, 60));
        assert_eq!(cfg.features.max_features, 3000);
        assert_eq!(cfg.features.patch_size, 31);
        assert_eq!(cfg.ransac_threshold, 2.5);
        assert_eq!(cfg.min_inlier_ratio, AlignConfig::default().min_inlier_ratio);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_roundtrip() {
        let cfg = AlignConfig::default().with_crop(CropSpec::new(10, 4)).with_max_matches(Some(500));
        let text = cfg.to_toml().unwrap();
        assert_eq!(AlignConfig::from_toml(&text).unwrap(), cfg);
    }

    #[cfg(feature = "serde")]
    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("parallax-config-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_save_and_load_toml_file() {
        let dir = scratch_dir("toml");
        let path = dir.join("parallax.toml");
        let cfg = AlignConfig::default().with_crop(CropSpec::new(200, 60)).with_seed(42);

        cfg.save_toml(&path).unwrap();

        assert_eq!(AlignConfig::load_toml(&path).unwrap(), cfg);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_file_roundtrip() {
        let dir = scratch_dir("json");
        let path = dir.join("parallax.json");
        let cfg = AlignConfig::default().with_max_matches(Some(300)).with_jpeg_quality(80);

        std::fs::write(&path, cfg.to_json().unwrap()).unwrap();

        assert_eq!(AlignConfig::load_json(&path).unwrap(), cfg);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_with_invalid_values_rejected() {
        let dir = scratch_dir("bad-json");
        let path = dir.join("parallax.json");
        std::fs::write(&path, r#"{ "ransac_threshold": -1.0 }"#).unwrap();

        assert!(matches!(AlignConfig::load_json(&path), Err(AlignError::InvalidConfig(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
