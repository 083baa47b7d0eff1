//! Parallax alignment of dual-camera stills.
//!
//! A [`Combiner`] registers a target image onto a reference image with FAST
//! keypoints, rotated BRIEF descriptors, cross-checked Hamming matching and a
//! RANSAC similarity estimate, warps the target onto the reference grid,
//! crops both images identically and places them side by side.

pub mod capture;
mod composite;
mod config;
mod crop;
mod error;
mod features;
pub mod motion;
mod output;
mod pipeline;
mod warp;

pub use capture::{capture_and_combine, capture_pair, output_filename, Camera, CaptureSettings, FileCamera};
pub use composite::compose_side_by_side;
pub use config::AlignConfig;
pub use crop::{crop, CropSpec};
pub use error::{AlignError, AlignResult, ErrorKind, ImageRole};
pub use features::{match_features, FeatureExtractor, FeatureSet};
pub use motion::{fit_similarity, point_pairs, MotionEstimate, MotionEstimator, MotionModel, PointPair};
pub use output::write_atomic;
pub use pipeline::{Alignment, Combination, Combiner};
pub use warp::warp;

pub use parallax_brief::HammingMatcher;
pub use parallax_core::{FeatureConfig, Keypoint, Match};
