use std::fmt;
use thiserror::Error;

/// Which of the two source images an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Reference,
    Target,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Reference => write!(f, "reference"),
            ImageRole::Target => write!(f, "target"),
        }
    }
}

/// Broad failure class, for callers deciding between re-capturing and giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source images or crop parameters are unusable
    Input,
    /// Images are fine but could not be registered
    Alignment,
    /// Encoding or writing the composite failed
    Output,
    /// Invalid parameters
    Config,
}

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("{role} image is empty ({width}x{height})")]
    EmptyImage { role: ImageRole, width: u32, height: u32 },

    #[error("no features found in {role} image")]
    NoFeaturesFound { role: ImageRole },

    #[error("insufficient descriptors: reference has {reference}, target has {target}")]
    InsufficientDescriptors { reference: usize, target: usize },

    #[error("insufficient correspondences: {found} found, at least {required} required")]
    InsufficientCorrespondences { found: usize, required: usize },

    #[error("degenerate motion: {reason}")]
    DegenerateMotion { reason: String },

    #[error("invalid crop (left {left}, bottom {bottom}) for {width}x{height} image")]
    InvalidCrop { left: u32, bottom: u32, width: u32, height: u32 },

    #[error("height mismatch: left image is {left} rows, right image is {right} rows")]
    HeightMismatch { left: u32, right: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("capture failed on camera `{camera}`: {source}")]
    Capture {
        camera: String,
        #[source]
        source: Box<AlignError>,
    },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AlignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AlignError::EmptyImage { .. }
            | AlignError::NoFeaturesFound { .. }
            | AlignError::InvalidCrop { .. }
            | AlignError::HeightMismatch { .. }
            | AlignError::Capture { .. } => ErrorKind::Input,
            AlignError::InsufficientDescriptors { .. }
            | AlignError::InsufficientCorrespondences { .. }
            | AlignError::DegenerateMotion { .. } => ErrorKind::Alignment,
            AlignError::Image(_) | AlignError::Io(_) => ErrorKind::Output,
            AlignError::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Everything except `NoFeaturesFound` aborts the current run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AlignError::NoFeaturesFound { .. })
    }
}

pub type AlignResult<T> = Result<T, AlignError>;
