use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FastError {
    #[error("Invalid image dimensions: {width}x{height} (must be > 0)")]
    InvalidImageSize { width: usize, height: usize },
    #[error("Image data length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidImageData { expected_len: usize, actual_len: usize },
    #[error("Invalid threshold: {0} (must be 1-127)")]
    InvalidThreshold(u8),
    #[error("Invalid patch size: {0} (must be odd and at least 7)")]
    InvalidPatchSize(usize),
    #[error("Edge threshold {edge_threshold} smaller than half patch {half_patch}")]
    InvalidEdgeThreshold { edge_threshold: usize, half_patch: usize },
    #[error("Invalid pyramid: {n_levels} levels with scale factor {scale_factor}")]
    InvalidPyramid { n_levels: usize, scale_factor: f32 },
    #[error("Feature budget must be at least 1")]
    InvalidFeatureBudget,
    #[error("No features found in {width}x{height} image")]
    NoFeaturesFound { width: usize, height: usize },
}

pub type FastResult<T> = Result<T, FastError>;
