use crate::error::{AlignError, AlignResult, ImageRole};
use crate::motion::MotionModel;
use image::RgbImage;
use rayon::prelude::*;

/// Source coordinates this far outside the target still sample its border pixels
const BORDER_TOLERANCE: f64 = 1e-3;

/// Resample `target` onto a `width` x `height` grid in reference coordinates.
///
/// `model` maps target → reference; each output pixel is pulled from the
/// target through the inverse transform with bilinear interpolation. Pixels
/// whose source falls outside the target are black.
pub fn warp(target: &RgbImage, model: &MotionModel, width: u32, height: u32) -> AlignResult<RgbImage> {
    let (tw, th) = target.dimensions();
    if tw == 0 || th == 0 {
        return Err(AlignError::EmptyImage {
            role: ImageRole::Target,
            width: tw,
            height: th,
        });
    }
    if width == 0 || height == 0 {
        return Err(AlignError::EmptyImage {
            role: ImageRole::Reference,
            width,
            height,
        });
    }

    let inverse = model.inverse().ok_or_else(|| AlignError::DegenerateMotion {
        reason: format!("transform is not invertible (determinant {:e})", model.determinant()),
    })?;

    let src = target.as_raw();
    let (src_w, src_h) = (tw as usize, th as usize);
    let max_x = (src_w - 1) as f64;
    let max_y = (src_h - 1) as f64;

    let mut out = RgbImage::new(width, height);
    out.par_chunks_mut(width as usize * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let (sx, sy) = inverse.apply(x as f64, y as f64);
                if !(sx >= -BORDER_TOLERANCE
                    && sy >= -BORDER_TOLERANCE
                    && sx <= max_x + BORDER_TOLERANCE
                    && sy <= max_y + BORDER_TOLERANCE)
                {
                    // Buffer starts black
                    continue;
                }
                sample_bilinear(src, src_w, src_h, sx.clamp(0.0, max_x), sy.clamp(0.0, max_y), px);
            }
        });

    log::debug!(
        "warped {}x{} target onto {}x{} grid (translation {:?}, rotation {:.4} rad, scale {:.4})",
        tw,
        th,
        width,
        height,
        model.translation(),
        model.rotation(),
        model.scale()
    );

    Ok(out)
}

#[inline]
fn sample_bilinear(src: &[u8], width: usize, height: usize, x: f64, y: f64, out: &mut [u8]) {
    let x1 = (x.floor() as usize).min(width - 1);
    let y1 = (y.floor() as usize).min(height - 1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);

    let fx = (x - x1 as f64).clamp(0.0, 1.0);
    let fy = (y - y1 as f64).clamp(0.0, 1.0);

    for (c, value) in out.iter_mut().enumerate() {
        let p11 = src[(y1 * width + x1) * 3 + c] as f64;
        let p12 = src[(y1 * width + x2) * 3 + c] as f64;
        let p21 = src[(y2 * width + x1) * 3 + c] as f64;
        let p22 = src[(y2 * width + x2) * 3 + c] as f64;

        let top = p11 * (1.0 - fx) + p12 * fx;
        let bottom = p21 * (1.0 - fx) + p22 * fx;
        *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
}
