use parallax_core::{Plane, PyramidLevel};
use crate::types::ScaleLevel;
use rayon::prelude::*;

/// Image pyramid operations for multi-scale feature detection
pub struct ImagePyramid;

impl ImagePyramid {
    /// Generate scale levels for image pyramid.
    ///
    /// Levels whose shorter side would drop below `min_size` are not generated,
    /// so an image smaller than `min_size` yields no levels at all.
    pub fn generate_scale_levels(
        width: usize,
        height: usize,
        n_levels: usize,
        scale_factor: f32,
        min_size: usize,
    ) -> Vec<ScaleLevel> {
        let mut levels = Vec::with_capacity(n_levels);
        let mut current_scale = 1.0f32;

        for level in 0..n_levels {
            let scaled_width = ((width as f32) / current_scale).round() as usize;
            let scaled_height = ((height as f32) / current_scale).round() as usize;

            if scaled_width < min_size || scaled_height < min_size {
                break;
            }

            levels.push(ScaleLevel {
                level,
                scale: current_scale,
                width: scaled_width,
                height: scaled_height,
            });

            current_scale *= scale_factor;
        }

        levels
    }

    /// Build image pyramid from base image, each level resampled from the previous one
    pub fn build_image_pyramid(img: &Plane, width: usize, height: usize, scale_levels: &[ScaleLevel]) -> Vec<PyramidLevel> {
        let mut pyramid: Vec<PyramidLevel> = Vec::with_capacity(scale_levels.len());

        for scale_level in scale_levels {
            let plane = match pyramid.last() {
                None => img.clone(),
                Some(prev) => Self::downsample_image(
                    &prev.plane,
                    prev.width,
                    prev.height,
                    scale_level.width,
                    scale_level.height,
                ),
            };
            let smoothed = Self::smooth(&plane, scale_level.width, scale_level.height);

            pyramid.push(PyramidLevel {
                octave: scale_level.level,
                scale: scale_level.scale,
                scale_x: width as f32 / scale_level.width as f32,
                scale_y: height as f32 / scale_level.height as f32,
                width: scale_level.width,
                height: scale_level.height,
                plane,
                smoothed,
            });
        }

        pyramid
    }

    /// Downsample image using bilinear interpolation on pixel centres
    fn downsample_image(img: &Plane, src_width: usize, src_height: usize, target_width: usize, target_height: usize) -> Plane {
        let mut downsampled = vec![0u8; target_width * target_height];

        let x_ratio = src_width as f32 / target_width as f32;
        let y_ratio = src_height as f32 / target_height as f32;

        downsampled
            .par_chunks_mut(target_width)
            .enumerate()
            .for_each(|(y, row)| {
                let src_y = ((y as f32 + 0.5) * y_ratio - 0.5).max(0.0);
                for (x, out) in row.iter_mut().enumerate() {
                    let src_x = ((x as f32 + 0.5) * x_ratio - 0.5).max(0.0);
                    let value = Self::bilinear_sample(img, src_width, src_height, src_x, src_y);
                    *out = value.round().clamp(0.0, 255.0) as u8;
                }
            });

        downsampled
    }

    /// Sample image at fractional coordinates using bilinear interpolation
    fn bilinear_sample(img: &Plane, width: usize, height: usize, x: f32, y: f32) -> f32 {
        let x1 = (x.floor() as usize).min(width - 1);
        let y1 = (y.floor() as usize).min(height - 1);
        let x2 = (x1 + 1).min(width - 1);
        let y2 = (y1 + 1).min(height - 1);

        let fx = (x - x1 as f32).clamp(0.0, 1.0);
        let fy = (y - y1 as f32).clamp(0.0, 1.0);

        let p11 = img[y1 * width + x1] as f32;
        let p12 = img[y1 * width + x2] as f32;
        let p21 = img[y2 * width + x1] as f32;
        let p22 = img[y2 * width + x2] as f32;

        let interpolated_top = p11 * (1.0 - fx) + p12 * fx;
        let interpolated_bottom = p21 * (1.0 - fx) + p22 * fx;

        interpolated_top * (1.0 - fy) + interpolated_bottom * fy
    }

    /// Separable 5-tap binomial blur with clamped borders
    pub fn smooth(img: &Plane, width: usize, height: usize) -> Plane {
        const KERNEL: [u32; 5] = [1, 4, 6, 4, 1];

        let mut horizontal = vec![0u16; width * height];
        horizontal
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let src = &img[y * width..(y + 1) * width];
                for (x, out) in row.iter_mut().enumerate() {
                    let mut acc = 0u32;
                    for (k, &w) in KERNEL.iter().enumerate() {
                        let xx = (x as i64 + k as i64 - 2).clamp(0, width as i64 - 1) as usize;
                        acc += w * src[xx] as u32;
                    }
                    *out = acc as u16;
                }
            });

        let mut smoothed = vec![0u8; width * height];
        smoothed
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let mut acc = 0u32;
                    for (k, &w) in KERNEL.iter().enumerate() {
                        let yy = (y as i64 + k as i64 - 2).clamp(0, height as i64 - 1) as usize;
                        acc += w * horizontal[yy * width + x] as u32;
                    }
                    *out = ((acc + 128) / 256) as u8;
                }
            });

        smoothed
    }
}
