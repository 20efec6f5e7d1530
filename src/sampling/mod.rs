// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Training sample generation.

use rand::Rng;

use crate::data::Interactions;

mod biased;
mod ratings;
mod uniform;

pub use biased::AttributeBiasedSampler;
pub use ratings::RatingOrder;
pub use uniform::{fast_memory_estimate, UniformSampler};

/// Draws (user, positive, negative) triples for pairwise training.
///
/// Samplers hold only their own tables; the interaction store and the
/// random generator are passed in on every call.
pub trait PairSampler {
    /// Draw a user with at least one positive and one eligible negative item.
    fn sample_user<R: Rng + ?Sized>(&self, data: &Interactions, rng: &mut R) -> u32;

    /// Draw a (positive, negative) item pair for a user.
    fn sample_pair<R: Rng + ?Sized>(&self, data: &Interactions, user: u32, rng: &mut R)
        -> (u32, u32);

    fn sample_triple<R: Rng + ?Sized>(&self, data: &Interactions, rng: &mut R) -> (u32, u32, u32) {
        let u = self.sample_user(data, rng);
        let (i, j) = self.sample_pair(data, u, rng);
        (u, i, j)
    }
}

/// The negative-sampling strategy chosen for a trainer.
#[derive(Debug, Clone)]
pub enum Sampler {
    Uniform(UniformSampler),
    AttributeBiased(AttributeBiasedSampler),
}

impl PairSampler for Sampler {
    fn sample_user<R: Rng + ?Sized>(&self, data: &Interactions, rng: &mut R) -> u32 {
        match self {
            Sampler::Uniform(s) => s.sample_user(data, rng),
            Sampler::AttributeBiased(s) => s.sample_user(data, rng),
        }
    }

    fn sample_pair<R: Rng + ?Sized>(
        &self,
        data: &Interactions,
        user: u32,
        rng: &mut R,
    ) -> (u32, u32) {
        match self {
            Sampler::Uniform(s) => s.sample_pair(data, user, rng),
            Sampler::AttributeBiased(s) => s.sample_pair(data, user, rng),
        }
    }
}
