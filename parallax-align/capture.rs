//! Boundary to the camera side: acquiring the two stills that feed the pipeline.

use crate::error::{AlignError, AlignResult};
use crate::pipeline::{Combination, Combiner};
use image::RgbImage;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Exposure settings handed to each camera; `None` leaves the camera's own choice
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CaptureSettings {
    pub shutter_us: Option<u32>,
    pub gain: Option<f32>,
    pub awb: Option<bool>,
}

impl CaptureSettings {
    pub fn new(shutter_us: u32, gain: f32, awb: bool) -> Self {
        Self {
            shutter_us: Some(shutter_us),
            gain: Some(gain),
            awb: Some(awb),
        }
    }
}

/// A source of still frames
pub trait Camera: Send + Sync {
    fn name(&self) -> &str;

    /// Produce one settled, decoded still
    fn capture(&self, settings: &CaptureSettings) -> AlignResult<RgbImage>;
}

/// Camera stand-in that decodes a still from disk
#[derive(Debug, Clone)]
pub struct FileCamera {
    name: String,
    path: PathBuf,
}

impl FileCamera {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl Camera for FileCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn capture(&self, settings: &CaptureSettings) -> AlignResult<RgbImage> {
        log::debug!("{}: reading {} ({:?})", self.name, self.path.display(), settings);
        Ok(image::open(&self.path)?.to_rgb8())
    }
}

fn capture_one(camera: &dyn Camera, settings: &CaptureSettings) -> AlignResult<RgbImage> {
    camera.capture(settings).map_err(|source| AlignError::Capture {
        camera: camera.name().to_string(),
        source: Box::new(source),
    })
}

/// Capture from both cameras concurrently and wait for both.
///
/// If either capture fails the error is returned (the reference camera's
/// first) and the other frame is dropped.
pub fn capture_pair(
    reference: &dyn Camera,
    target: &dyn Camera,
    settings: &CaptureSettings,
) -> AlignResult<(RgbImage, RgbImage)> {
    let (reference_img, target_img) = rayon::join(
        || capture_one(reference, settings),
        || capture_one(target, settings),
    );
    Ok((reference_img?, target_img?))
}

/// Capture both frames, then align, combine and write the composite to `dest`
pub fn capture_and_combine(
    combiner: &Combiner,
    reference: &dyn Camera,
    target: &dyn Camera,
    settings: &CaptureSettings,
    dest: &Path,
) -> AlignResult<Combination> {
    let (reference_img, target_img) = capture_pair(reference, target, settings)?;
    combiner.combine_to_path(&reference_img, &target_img, dest)
}

/// `{prefix}_shutter-{us}_gain-{g}_awb-{on|off}_{stamp}.jpg`, omitting unset settings
pub fn output_filename(prefix: &str, settings: &CaptureSettings, stamp: &str) -> String {
    let mut parts = vec![prefix.to_string()];
    if let Some(shutter) = settings.shutter_us {
        parts.push(format!("shutter-{}", shutter));
    }
    if let Some(gain) = settings.gain {
        parts.push(format!("gain-{:?}", gain));
    }
    if let Some(awb) = settings.awb {
        parts.push(format!("awb-{}", if awb { "on" } else { "off" }));
    }
    parts.push(stamp.to_string());
    format!("{}.jpg", parts.join("_"))
}
