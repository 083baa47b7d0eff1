use parallax_core::{Keypoint, Plane};
use crate::types::Corner;

/// Subpixel refinement, orientation and best-N retention
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Refine a corner to subpixel accuracy with a parabola through its 3x3 response neighbourhood
    pub fn refine_subpixel(responses: &[f32], width: usize, height: usize, corner: &Corner) -> (f32, f32) {
        let (x, y) = (corner.x, corner.y);
        if x < 1 || y < 1 || x + 1 >= width || y + 1 >= height {
            return (x as f32, y as f32);
        }

        let at = |xx: usize, yy: usize| responses[yy * width + xx];
        let center = at(x, y);

        let offset = |before: f32, after: f32| {
            let curvature = before - 2.0 * center + after;
            if curvature < -1e-6 {
                (0.5 * (before - after) / curvature).clamp(-0.5, 0.5)
            } else {
                0.0
            }
        };

        let dx = offset(at(x - 1, y), at(x + 1, y));
        let dy = offset(at(x, y - 1), at(x, y + 1));

        (x as f32 + dx, y as f32 + dy)
    }

    /// Compute orientation using the intensity centroid of a circular patch
    pub fn compute_orientation(img: &Plane, width: usize, height: usize, x: usize, y: usize, patch_size: usize) -> f32 {
        let half = (patch_size / 2) as i32;
        let radius_sq = half * half;
        let (cx, cy) = (x as i32, y as i32);

        let mut m10 = 0i64; // i64 to prevent overflow on large patches
        let mut m01 = 0i64;

        for dy in -half..=half {
            let yy = (cy + dy).clamp(0, height as i32 - 1) as usize;
            for dx in -half..=half {
                if dx * dx + dy * dy > radius_sq {
                    continue;
                }
                let xx = (cx + dx).clamp(0, width as i32 - 1) as usize;
                let val = img[yy * width + xx] as i64;
                m10 += dx as i64 * val;
                m01 += dy as i64 * val;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }

    /// Keep the `max_features` strongest keypoints.
    ///
    /// Ties are ordered by octave, then y, then x, so the retained set does not
    /// depend on detection order.
    pub fn retain_best(keypoints: &mut Vec<Keypoint>, max_features: usize) {
        keypoints.sort_by(|a, b| {
            b.response
                .total_cmp(&a.response)
                .then(a.octave.cmp(&b.octave))
                .then(a.y.total_cmp(&b.y))
                .then(a.x.total_cmp(&b.x))
        });
        keypoints.truncate(max_features);
    }
}
