//! Multi-scale FAST keypoint detection.
//!
//! The detector builds a scale pyramid, runs the FAST-9 segment test on every
//! level, suppresses non-maximal responses, refines survivors to subpixel
//! accuracy and assigns an intensity-centroid orientation. Keypoints are
//! reported in base image coordinates.

mod corner_detection;
mod detector;
mod error;
mod pyramid;
mod refinement;
mod types;

pub use corner_detection::CornerDetector;
pub use detector::{Detection, FastDetector};
pub use error::{FastError, FastResult};
pub use pyramid::ImagePyramid;
pub use refinement::KeypointRefinement;
pub use types::{Corner, ScaleLevel};
