use parallax_core::Plane;
use crate::types::{Corner, CornerType};
use rayon::prelude::*;

/// Minimum contiguous arc length for a FAST-9 corner
const ARC_LENGTH: usize = 9;

/// FAST segment test and non-maximum suppression
pub struct CornerDetector;

impl CornerDetector {
    /// FAST circle offsets for corner detection (Bresenham circle of radius 3, clockwise from top)
    pub const FAST_OFFSETS: [(i32, i32); 16] = [
        (0, -3), (1, -3), (2, -2), (3, -1),
        (3, 0), (3, 1), (2, 2), (1, 3),
        (0, 3), (-1, 3), (-2, 2), (-3, 1),
        (-3, 0), (-3, -1), (-2, -2), (-1, -3),
    ];

    /// Corner response for every pixel at least `border` pixels from the edge; 0 means "not a corner"
    pub fn response_map(img: &Plane, width: usize, height: usize, threshold: u8, border: usize) -> Vec<f32> {
        let mut responses = vec![0.0f32; width * height];
        let border = border.max(3);
        if width <= 2 * border || height <= 2 * border {
            return responses;
        }

        responses
            .par_chunks_mut(width)
            .enumerate()
            .filter(|(y, _)| *y >= border && *y < height - border)
            .for_each(|(y, row)| {
                for x in border..width - border {
                    if let Some(response) = Self::segment_test(img, width, x, y, threshold) {
                        row[x] = response;
                    }
                }
            });

        responses
    }

    /// FAST-9 segment test; returns the mean absolute arc difference when the pixel is a corner
    fn segment_test(img: &Plane, width: usize, x: usize, y: usize, threshold: u8) -> Option<f32> {
        let center = img[y * width + x] as i32;
        let t = threshold as i32;

        let mut circle = [0i32; 16];
        for (value, &(dx, dy)) in circle.iter_mut().zip(Self::FAST_OFFSETS.iter()) {
            let px = (x as i32 + dx) as usize;
            let py = (y as i32 + dy) as usize;
            *value = img[py * width + px] as i32;
        }

        let classify = |v: i32| {
            if v > center + t {
                CornerType::Bright
            } else if v < center - t {
                CornerType::Dark
            } else {
                CornerType::None
            }
        };

        // Any 9-arc covers at least two of the four compass pixels
        let compass = [classify(circle[0]), classify(circle[4]), classify(circle[8]), classify(circle[12])];
        let bright = compass.iter().filter(|&&c| c == CornerType::Bright).count();
        let dark = compass.iter().filter(|&&c| c == CornerType::Dark).count();
        if bright < 2 && dark < 2 {
            return None;
        }

        for kind in [CornerType::Bright, CornerType::Dark] {
            let mut run = 0usize;
            let mut best = 0usize;
            for i in 0..16 + ARC_LENGTH - 1 {
                if classify(circle[i % 16]) == kind {
                    run += 1;
                    best = best.max(run);
                } else {
                    run = 0;
                }
            }

            if best >= ARC_LENGTH {
                let (sum, count) = circle
                    .iter()
                    .filter(|&&v| classify(v) == kind)
                    .fold((0i32, 0i32), |(s, c), &v| (s + (v - center).abs(), c + 1));
                return Some(sum as f32 / count as f32);
            }
        }

        None
    }

    /// 3x3 non-maximum suppression on a response map.
    ///
    /// Plateaus keep only their first pixel in raster order, so the result is deterministic.
    pub fn non_maximum_suppression(responses: &[f32], width: usize, height: usize, border: usize) -> Vec<Corner> {
        let border = border.max(3);
        if width <= 2 * border || height <= 2 * border {
            return Vec::new();
        }

        (border..height - border)
            .into_par_iter()
            .flat_map_iter(|y| {
                let mut row_corners = Vec::new();
                for x in border..width - border {
                    let r = responses[y * width + x];
                    if r <= 0.0 {
                        continue;
                    }

                    let mut is_local_max = true;
                    'neighbours: for dy in -1i32..=1 {
                        for dx in -1i32..=1 {
                            if dx == 0 && dy == 0 {
                                continue;
                            }
                            let n = responses[(y as i32 + dy) as usize * width + (x as i32 + dx) as usize];
                            let earlier = dy < 0 || (dy == 0 && dx < 0);
                            if (earlier && n >= r) || (!earlier && n > r) {
                                is_local_max = false;
                                break 'neighbours;
                            }
                        }
                    }

                    if is_local_max {
                        row_corners.push(Corner { x, y, response: r });
                    }
                }
                row_corners
            })
            .collect()
    }
}
