use parallax_core::{hamming_distance, Descriptor, Match};
use rayon::prelude::*;

/// Brute-force Hamming matcher
#[derive(Debug, Clone)]
pub struct HammingMatcher {
    cross_check: bool,
    max_matches: Option<usize>,
}

impl Default for HammingMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HammingMatcher {
    /// Matcher with cross-check enabled and no truncation
    pub fn new() -> Self {
        Self {
            cross_check: true,
            max_matches: None,
        }
    }

    pub fn with_cross_check(mut self, enable: bool) -> Self {
        self.cross_check = enable;
        self
    }

    /// Keep only the best `n` matches
    pub fn with_max_matches(mut self, n: Option<usize>) -> Self {
        self.max_matches = n;
        self
    }

    /// Nearest `train` descriptor for `query`; ties resolve to the lowest index
    fn nearest(query: &Descriptor, train: &[Descriptor]) -> Option<(usize, u32)> {
        train
            .iter()
            .enumerate()
            .map(|(idx, t)| (idx, hamming_distance(query, t)))
            .min_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
    }

    /// Match reference descriptors against target descriptors.
    ///
    /// Returns an empty set when either side is empty. Output is sorted by
    /// (distance, reference, target).
    pub fn match_descriptors(&self, reference: &[Descriptor], target: &[Descriptor]) -> Vec<Match> {
        if reference.is_empty() || target.is_empty() {
            return Vec::new();
        }

        let forward: Vec<Option<(usize, u32)>> = reference
            .par_iter()
            .map(|d| Self::nearest(d, target))
            .collect();

        let backward: Vec<Option<(usize, u32)>> = if self.cross_check {
            target.par_iter().map(|d| Self::nearest(d, reference)).collect()
        } else {
            Vec::new()
        };

        let mut matches: Vec<Match> = forward
            .iter()
            .enumerate()
            .filter_map(|(ref_idx, best)| {
                let (tgt_idx, distance) = (*best)?;
                if self.cross_check && backward[tgt_idx].map(|(back, _)| back) != Some(ref_idx) {
                    return None;
                }
                Some(Match {
                    reference: ref_idx,
                    target: tgt_idx,
                    distance,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then(a.reference.cmp(&b.reference))
                .then(a.target.cmp(&b.target))
        });

        if let Some(n) = self.max_matches {
            matches.truncate(n);
        }

        log::debug!(
            "matched {} of {}x{} descriptors (cross_check={})",
            matches.len(),
            reference.len(),
            target.len(),
            self.cross_check
        );

        matches
    }
}
