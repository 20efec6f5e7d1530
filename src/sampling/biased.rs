// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Negative sampling biased by learned attribute weights.

use ndarray::Array2;
use rand::Rng;

use crate::config::SamplingConfig;
use crate::data::{BooleanMatrix, Interactions};

use super::{PairSampler, UniformSampler};

/// Prefers item pairs whose mean attribute weight, under a per-user
/// attribute weight table, differ by at least a margin.
///
/// When the second item is also a positive, the pair is ordered so the item
/// with the higher mean weight comes first.  If no candidate passes within
/// the draw limit, or the positive item has no attribute row, the pair falls
/// back to uniform sampling.
#[derive(Debug, Clone)]
pub struct AttributeBiasedSampler {
    uniform: UniformSampler,
    attributes: BooleanMatrix,
    weights: Array2<f32>,
    margin: f32,
    max_draws: usize,
}

impl AttributeBiasedSampler {
    pub fn new(
        uniform: UniformSampler,
        attributes: BooleanMatrix,
        weights: Array2<f32>,
        config: &SamplingConfig,
    ) -> AttributeBiasedSampler {
        AttributeBiasedSampler {
            uniform,
            attributes,
            weights,
            margin: config.biased_margin,
            max_draws: config.biased_max_draws,
        }
    }

    /// Mean of a user's weights over an item's attributes (0 with no attributes).
    pub fn mean_weight(&self, user: u32, item: u32) -> f32 {
        let attrs = self.attributes.row(item);
        let u = user as usize;
        if attrs.is_empty() || u >= self.weights.nrows() {
            return 0.0;
        }
        let row = self.weights.row(u);
        let sum: f32 = attrs
            .iter()
            .map(|a| row.get(*a as usize).copied().unwrap_or(0.0))
            .sum();
        sum / attrs.len() as f32
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }
}

impl PairSampler for AttributeBiasedSampler {
    fn sample_user<R: Rng + ?Sized>(&self, data: &Interactions, rng: &mut R) -> u32 {
        self.uniform.sample_user(data, rng)
    }

    fn sample_pair<R: Rng + ?Sized>(
        &self,
        data: &Interactions,
        user: u32,
        rng: &mut R,
    ) -> (u32, u32) {
        let i = self.uniform.sample_positive(data, user, rng);
        if !self.attributes.has_row(i) {
            return (i, self.uniform.sample_negative(data, user, rng));
        }

        let n_items = data.n_items() as u32;
        let w_i = self.mean_weight(user, i);
        for _ in 0..self.max_draws {
            let j = rng.random_range(0..n_items);
            if j == i || !self.attributes.has_row(j) {
                continue;
            }
            let positive = data.contains(user, j);
            if !positive && data.item_count(j) == 0 {
                continue;
            }
            let w_j = self.mean_weight(user, j);
            if (w_i - w_j).abs() < self.margin {
                continue;
            }
            if positive && w_i < w_j {
                return (j, i);
            }
            return (i, j);
        }

        (i, self.uniform.sample_negative(data, user, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn setup(weights: Array2<f32>) -> (Interactions, AttributeBiasedSampler) {
        let data = Interactions::implicit(vec![(0, 0), (0, 1), (1, 1), (1, 2), (2, 3)]);
        let attrs = BooleanMatrix::from_rows(&[vec![5], vec![6], vec![5], vec![6]], 8);
        let cfg = SamplingConfig::default();
        let uniform = UniformSampler::new(&data, &cfg).expect("eligible users");
        let sampler = AttributeBiasedSampler::new(uniform, attrs, weights, &cfg);
        (data, sampler)
    }

    #[test]
    fn test_never_self_pairs() {
        let (data, sampler) = setup(Array2::zeros((3, 8)));
        let mut rng = Pcg64::seed_from_u64(1);
        for _ in 0..5000 {
            let (i, j) = sampler.sample_pair(&data, 0, &mut rng);
            assert_ne!(i, j);
            assert!(data.contains(0, i));
            // with zero weights nothing passes the margin, so j is uniform
            assert!(!data.contains(0, j));
        }
    }

    #[test]
    fn test_orders_positive_pairs() {
        // user 0 strongly prefers attribute 6 (item 1) over attribute 5 (item 0)
        let mut weights = Array2::zeros((3, 8));
        weights[(0, 5)] = -2.0;
        weights[(0, 6)] = 2.0;
        let (data, sampler) = setup(weights);
        assert_eq!(sampler.mean_weight(0, 1), 2.0);

        let mut rng = Pcg64::seed_from_u64(2);
        let mut ordered = 0;
        for _ in 0..5000 {
            let (i, j) = sampler.sample_pair(&data, 0, &mut rng);
            assert_ne!(i, j);
            assert!(data.contains(0, i));
            if data.contains(0, j) {
                // both positives: the higher-weight item must come first
                assert_eq!((i, j), (1, 0));
                ordered += 1;
            } else {
                assert!(
                    (sampler.mean_weight(0, i) - sampler.mean_weight(0, j)).abs() >= 2.5
                        || sampler.mean_weight(0, i) == sampler.mean_weight(0, j)
                );
            }
        }
        assert!(ordered > 0);
    }
}
