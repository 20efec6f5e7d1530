// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Per-user item attribute weights learned by BPR.

use std::sync::Arc;

use log::*;
use ndarray::Array2;
use rand_pcg::Pcg64;

use crate::config::{BprLinearConfig, Config, SamplingConfig};
use crate::data::{BooleanMatrix, Interactions};
use crate::errors::Result;
use crate::model::{make_rng, ModelArchive};
use crate::sampling::{PairSampler, UniformSampler};
use crate::scoring::{Predictor, UNKNOWN_SCORE};

use super::{log_loss, Trainer};

/// Learns a user × attribute weight table where an item's score for a user
/// is the sum of the user's weights for the item's attributes.
///
/// Each step only touches the attributes that one item of the pair has and
/// the other lacks.
pub struct BprLinearTrainer {
    config: BprLinearConfig,
    data: Arc<Interactions>,
    attributes: BooleanMatrix,
    sampler: UniformSampler,
    weights: Array2<f32>,
    rng: Pcg64,
    iterations: usize,
}

impl BprLinearTrainer {
    pub fn new(
        config: BprLinearConfig,
        data: Interactions,
        attributes: BooleanMatrix,
        sampling: &SamplingConfig,
        seed: u64,
    ) -> Result<BprLinearTrainer> {
        let data = data.with_min_dims(0, attributes.n_rows());
        let sampler = UniformSampler::new(&data, sampling)?;
        BprLinearTrainer::with_sampler(config, Arc::new(data), attributes, sampler, seed)
    }

    /// Set up a trainer sharing data and a sampler with another trainer.
    pub fn with_sampler(
        config: BprLinearConfig,
        data: Arc<Interactions>,
        attributes: BooleanMatrix,
        sampler: UniformSampler,
        seed: u64,
    ) -> Result<BprLinearTrainer> {
        config.validate()?;
        let weights = Array2::zeros((data.n_users(), attributes.n_cols()));
        debug!(
            "attribute weight table has {} users and {} attributes",
            weights.nrows(),
            weights.ncols()
        );
        Ok(BprLinearTrainer {
            config,
            data,
            attributes,
            sampler,
            weights,
            rng: make_rng(seed),
            iterations: 0,
        })
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    pub fn into_weights(self) -> Array2<f32> {
        self.weights
    }

    fn raw_score(&self, user: u32, item: u32) -> f32 {
        let row = self.weights.row(user as usize);
        self.attributes
            .row(item)
            .iter()
            .map(|a| row[*a as usize])
            .sum()
    }

    /// Apply one gradient step; returns the pairwise loss before the step.
    pub fn step(&mut self, user: u32, pos: u32, neg: u32) -> f64 {
        let x_uij = (self.raw_score(user, pos) - self.raw_score(user, neg)) as f64;
        let sig = (1.0 / (1.0 + x_uij.exp())) as f32;
        let lr = self.config.learn_rate;
        let reg = self.config.regularization;

        let pos_attrs = self.attributes.row(pos);
        let neg_attrs = self.attributes.row(neg);
        let mut row = self.weights.row_mut(user as usize);
        for a in difference(pos_attrs, neg_attrs) {
            let w = row[a as usize];
            row[a as usize] = w + lr * (sig - reg * w);
        }
        for a in difference(neg_attrs, pos_attrs) {
            let w = row[a as usize];
            row[a as usize] = w + lr * (-sig - reg * w);
        }

        log_loss(x_uij)
    }

    pub fn to_archive(&self) -> ModelArchive {
        let mut ar = ModelArchive::new("bpr-linear");
        ar.push_matrix("attribute_weights", &self.weights);
        ar
    }
}

// both lists are sorted
fn difference<'a>(a: &'a [u32], b: &'a [u32]) -> impl Iterator<Item = u32> + 'a {
    a.iter()
        .copied()
        .filter(move |x| b.binary_search(x).is_err())
}

impl Trainer for BprLinearTrainer {
    fn iterate(&mut self) -> f64 {
        let n = self.data.n_pairs();
        let data = Arc::clone(&self.data);
        let mut loss = 0.0;
        for _ in 0..n {
            let (u, i, j) = self.sampler.sample_triple(&data, &mut self.rng);
            loss += self.step(u, i, j);
        }
        self.iterations += 1;
        if n > 0 {
            loss / n as f64
        } else {
            0.0
        }
    }

    fn iterations(&self) -> usize {
        self.iterations
    }

    fn samples_per_iteration(&self) -> usize {
        self.data.n_pairs()
    }

    fn learn_rate(&self) -> f32 {
        self.config.learn_rate
    }

    fn model_bytes(&self) -> usize {
        self.weights.len() * std::mem::size_of::<f32>()
    }
}

impl Predictor for BprLinearTrainer {
    fn score(&self, user: u32, item: u32) -> f32 {
        if user as usize >= self.weights.nrows() || item as usize >= self.data.n_items() {
            return UNKNOWN_SCORE;
        }
        self.raw_score(user, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learns_attribute_preference() {
        let data = Interactions::implicit(vec![(0, 0), (0, 1), (1, 1), (1, 2), (2, 3)]);
        let attrs = BooleanMatrix::from_rows(&[vec![0], vec![0], vec![1], vec![1]], 2);
        let mut t = BprLinearTrainer::new(
            BprLinearConfig::default(),
            data,
            attrs,
            &SamplingConfig::default(),
            42,
        )
        .expect("valid trainer");
        let stats = t.train(10);
        assert_eq!(stats.iterations, 10);

        // user 0's positives all have attribute 0 and negatives attribute 1
        assert!(t.weights()[(0, 0)] > 0.0);
        assert!(t.weights()[(0, 1)] < 0.0);
        assert!(t.score(0, 0) > t.score(0, 2));
        assert_eq!(t.score(9, 0), UNKNOWN_SCORE);
    }

    #[test]
    fn test_shared_attributes_untouched() {
        let data = Interactions::implicit(vec![(0, 0), (1, 1)]);
        let attrs = BooleanMatrix::from_rows(&[vec![0, 2], vec![1, 2]], 3);
        let mut t = BprLinearTrainer::new(
            BprLinearConfig::default(),
            data,
            attrs,
            &SamplingConfig::default(),
            1,
        )
        .expect("valid trainer");
        t.step(0, 0, 1);
        assert!(t.weights()[(0, 0)] > 0.0);
        assert!(t.weights()[(0, 1)] < 0.0);
        assert_eq!(t.weights()[(0, 2)], 0.0);
    }

    #[test]
    fn test_difference() {
        let d: Vec<u32> = difference(&[1, 3, 5, 7], &[3, 4, 7]).collect();
        assert_eq!(d, vec![1, 5]);
    }
}
