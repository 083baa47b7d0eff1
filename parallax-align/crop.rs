use crate::error::{AlignError, AlignResult};
use image::{imageops, RgbImage};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pixels removed from the left and bottom edges of both images in a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CropSpec {
    pub left: u32,
    pub bottom: u32,
}

impl CropSpec {
    pub fn new(left: u32, bottom: u32) -> Self {
        Self { left, bottom }
    }

    /// Check the crop leaves at least one pixel of a `width` x `height` image
    pub fn validate(&self, width: u32, height: u32) -> AlignResult<()> {
        if self.left >= width || self.bottom >= height {
            return Err(AlignError::InvalidCrop {
                left: self.left,
                bottom: self.bottom,
                width,
                height,
            });
        }
        Ok(())
    }

    /// Dimensions of a `width` x `height` image after cropping
    pub fn cropped_dimensions(&self, width: u32, height: u32) -> AlignResult<(u32, u32)> {
        self.validate(width, height)?;
        Ok((width - self.left, height - self.bottom))
    }
}

/// Remove `spec.left` columns from the left edge and `spec.bottom` rows from the bottom edge
pub fn crop(img: &RgbImage, spec: CropSpec) -> AlignResult<RgbImage> {
    let (width, height) = img.dimensions();
    let (out_w, out_h) = spec.cropped_dimensions(width, height)?;
    Ok(imageops::crop_imm(img, spec.left, 0, out_w, out_h).to_image())
}
