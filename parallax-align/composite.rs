use crate::error::{AlignError, AlignResult};
use image::{imageops, RgbImage};

/// Place `left` at columns `[0, w1)` and `right` at `[w1, w1 + w2)` of a new image
pub fn compose_side_by_side(left: &RgbImage, right: &RgbImage) -> AlignResult<RgbImage> {
    let (w1, h1) = left.dimensions();
    let (w2, h2) = right.dimensions();
    if h1 != h2 {
        return Err(AlignError::HeightMismatch { left: h1, right: h2 });
    }

    let mut combined = RgbImage::new(w1 + w2, h1);
    imageops::replace(&mut combined, left, 0, 0);
    imageops::replace(&mut combined, right, w1 as i64, 0);
    Ok(combined)
}
