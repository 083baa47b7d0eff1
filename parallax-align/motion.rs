//! Robust similarity estimation between matched keypoints.
//!
//! The model maps target image coordinates onto the reference frame and is
//! restricted to rotation, uniform scale and translation. Minimal samples of
//! two correspondences are drawn with a seeded RNG so estimates are
//! reproducible run to run.

use crate::config::AlignConfig;
use crate::error::{AlignError, AlignResult};
use parallax_core::{Keypoint, Match};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// 2x3 affine transform `[a b tx; c d ty]`, target → reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionModel {
    m: [[f64; 3]; 2],
}

impl MotionModel {
    pub fn identity() -> Self {
        Self::from_similarity(1.0, 0.0, 0.0, 0.0)
    }

    /// `[a -b tx; b a ty]`: rotation by atan2(b, a), scale hypot(a, b)
    pub fn from_similarity(a: f64, b: f64, tx: f64, ty: f64) -> Self {
        Self {
            m: [[a, -b, tx], [b, a, ty]],
        }
    }

    pub fn from_translation(tx: f64, ty: f64) -> Self {
        Self::from_similarity(1.0, 0.0, tx, ty)
    }

    pub fn matrix(&self) -> [[f64; 3]; 2] {
        self.m
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.m[0][0] * x + self.m[0][1] * y + self.m[0][2],
            self.m[1][0] * x + self.m[1][1] * y + self.m[1][2],
        )
    }

    pub fn determinant(&self) -> f64 {
        self.m[0][0] * self.m[1][1] - self.m[0][1] * self.m[1][0]
    }

    /// Inverse transform, `None` when near-singular
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-9 {
            return None;
        }
        let [[a, b, tx], [c, d, ty]] = self.m;
        let ia = d / det;
        let ib = -b / det;
        let ic = -c / det;
        let id = a / det;
        Some(Self {
            m: [
                [ia, ib, -(ia * tx + ib * ty)],
                [ic, id, -(ic * tx + id * ty)],
            ],
        })
    }

    pub fn translation(&self) -> (f64, f64) {
        (self.m[0][2], self.m[1][2])
    }

    /// Rotation angle in radians
    pub fn rotation(&self) -> f64 {
        self.m[1][0].atan2(self.m[0][0])
    }

    /// Uniform scale factor (square root of the area change)
    pub fn scale(&self) -> f64 {
        self.determinant().abs().sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.m.iter().flatten().all(|v| v.is_finite())
    }
}

/// One correspondence in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPair {
    pub target: (f64, f64),
    pub reference: (f64, f64),
}

/// Build point pairs from matches and the keypoints they index
pub fn point_pairs(matches: &[Match], reference: &[Keypoint], target: &[Keypoint]) -> Vec<PointPair> {
    matches
        .iter()
        .filter_map(|m| {
            let r = reference.get(m.reference)?;
            let t = target.get(m.target)?;
            Some(PointPair {
                target: (t.x as f64, t.y as f64),
                reference: (r.x as f64, r.y as f64),
            })
        })
        .collect()
}

/// Result of robust estimation
#[derive(Debug, Clone)]
pub struct MotionEstimate {
    pub model: MotionModel,
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    /// Mean reprojection error of the inliers, in pixels
    pub residual: f64,
}

impl MotionEstimate {
    pub fn inlier_ratio(&self) -> f64 {
        if self.inliers.is_empty() {
            0.0
        } else {
            self.num_inliers as f64 / self.inliers.len() as f64
        }
    }
}

/// RANSAC estimator for a partial (similarity) affine model
#[derive(Debug, Clone)]
pub struct MotionEstimator {
    threshold: f64,
    max_iterations: usize,
    confidence: f64,
    refine_iterations: usize,
    min_inlier_ratio: f64,
    min_scale: f64,
    max_scale: f64,
    seed: u64,
}

impl MotionEstimator {
    /// Fewest correspondences accepted for an estimate
    pub const MIN_CORRESPONDENCES: usize = 3;
    const SAMPLE_SIZE: usize = 2;

    pub fn from_config(cfg: &AlignConfig) -> Self {
        Self {
            threshold: cfg.ransac_threshold,
            max_iterations: cfg.max_iterations,
            confidence: cfg.confidence,
            refine_iterations: cfg.refine_iterations,
            min_inlier_ratio: cfg.min_inlier_ratio,
            min_scale: cfg.min_scale,
            max_scale: cfg.max_scale,
            seed: cfg.ransac_seed,
        }
    }

    pub fn estimate(&self, pairs: &[PointPair]) -> AlignResult<MotionEstimate> {
        let n = pairs.len();
        if n < Self::MIN_CORRESPONDENCES {
            return Err(AlignError::InsufficientCorrespondences {
                found: n,
                required: Self::MIN_CORRESPONDENCES,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<MotionEstimate> = None;
        let mut iteration_limit = self.max_iterations;
        let mut iteration = 0;

        while iteration < iteration_limit {
            iteration += 1;

            let i = rng.random_range(0..n);
            let mut j = rng.random_range(0..n - 1);
            if j >= i {
                j += 1;
            }

            let Some(model) = fit_similarity([&pairs[i], &pairs[j]]) else {
                continue;
            };
            if !self.is_plausible(&model) {
                continue;
            }

            let candidate = self.score(model, pairs);
            if Self::is_better(&candidate, best.as_ref()) {
                iteration_limit = iteration_limit.min(self.required_iterations(candidate.num_inliers, n));
                best = Some(candidate);
            }
        }

        let Some(mut best) = best else {
            return Err(AlignError::DegenerateMotion {
                reason: format!("no plausible model among {} correspondences", n),
            });
        };

        log::debug!(
            "RANSAC: {} iterations, {}/{} inliers before refinement",
            iteration,
            best.num_inliers,
            n
        );

        for _ in 0..self.refine_iterations {
            let inlier_pairs = pairs.iter().zip(&best.inliers).filter(|(_, &inl)| inl).map(|(p, _)| p);
            let Some(model) = fit_similarity(inlier_pairs) else {
                break;
            };
            if !self.is_plausible(&model) {
                break;
            }
            let refined = self.score(model, pairs);
            if refined.num_inliers < best.num_inliers {
                break;
            }
            let converged = refined.inliers == best.inliers;
            best = refined;
            if converged {
                break;
            }
        }

        if best.inlier_ratio() < self.min_inlier_ratio {
            return Err(AlignError::DegenerateMotion {
                reason: format!(
                    "inlier ratio {:.3} ({}/{}) below minimum {:.3}",
                    best.inlier_ratio(),
                    best.num_inliers,
                    n,
                    self.min_inlier_ratio
                ),
            });
        }

        Ok(best)
    }

    /// Finite, invertible and within the accepted scale range
    fn is_plausible(&self, model: &MotionModel) -> bool {
        if !model.is_finite() || model.inverse().is_none() {
            return false;
        }
        let scale = model.scale();
        scale >= self.min_scale && scale <= self.max_scale
    }

    fn score(&self, model: MotionModel, pairs: &[PointPair]) -> MotionEstimate {
        let mut inliers = vec![false; pairs.len()];
        let mut num_inliers = 0;
        let mut total_error = 0.0;

        for (flag, pair) in inliers.iter_mut().zip(pairs) {
            let (px, py) = model.apply(pair.target.0, pair.target.1);
            let err = ((px - pair.reference.0).powi(2) + (py - pair.reference.1).powi(2)).sqrt();
            if err < self.threshold {
                *flag = true;
                num_inliers += 1;
                total_error += err;
            }
        }

        let residual = if num_inliers > 0 {
            total_error / num_inliers as f64
        } else {
            f64::INFINITY
        };

        MotionEstimate {
            model,
            inliers,
            num_inliers,
            residual,
        }
    }

    fn is_better(candidate: &MotionEstimate, best: Option<&MotionEstimate>) -> bool {
        match best {
            None => candidate.num_inliers > 0,
            Some(b) => {
                candidate.num_inliers > b.num_inliers
                    || (candidate.num_inliers == b.num_inliers && candidate.residual < b.residual)
            }
        }
    }

    /// Iterations needed to draw an all-inlier sample with the configured confidence
    fn required_iterations(&self, num_inliers: usize, n: usize) -> usize {
        let w = num_inliers as f64 / n as f64;
        let p_good = w.powi(Self::SAMPLE_SIZE as i32);
        if p_good >= 1.0 {
            return 1;
        }
        if p_good <= 0.0 {
            return self.max_iterations;
        }
        let k = (1.0 - self.confidence).ln() / (1.0 - p_good).ln();
        if k.is_finite() {
            (k.ceil() as usize).clamp(1, self.max_iterations)
        } else {
            self.max_iterations
        }
    }
}

/// Closed-form least-squares similarity mapping each pair's target onto its reference.
///
/// `None` when the target points are (nearly) coincident.
pub fn fit_similarity<'a, I>(pairs: I) -> Option<MotionModel>
where
    I: IntoIterator<Item = &'a PointPair>,
{
    let pairs: Vec<&PointPair> = pairs.into_iter().collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;

    let (mut sx, mut sy, mut dx, mut dy) = (0.0, 0.0, 0.0, 0.0);
    for p in &pairs {
        sx += p.target.0;
        sy += p.target.1;
        dx += p.reference.0;
        dy += p.reference.1;
    }
    let (sx, sy, dx, dy) = (sx / n, sy / n, dx / n, dy / n);

    let (mut dot, mut cross, mut norm) = (0.0, 0.0, 0.0);
    for p in &pairs {
        let (px, py) = (p.target.0 - sx, p.target.1 - sy);
        let (qx, qy) = (p.reference.0 - dx, p.reference.1 - dy);
        dot += px * qx + py * qy;
        cross += px * qy - py * qx;
        norm += px * px + py * py;
    }

    if norm < 1e-9 {
        return None;
    }

    let a = dot / norm;
    let b = cross / norm;
    let tx = dx - (a * sx - b * sy);
    let ty = dy - (b * sx + a * sy);

    Some(MotionModel::from_similarity(a, b, tx, ty))
}
