// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Uniform pair sampling with optional precomputed tables.

use log::*;
use rand::Rng;

use crate::config::SamplingConfig;
use crate::data::Interactions;
use crate::errors::{Error, Result};

use super::PairSampler;

/// Per-user positive and eligible-negative item lists in CSR layout.
#[derive(Debug, Clone)]
struct FastTables {
    users: Vec<u32>,
    neg_ptrs: Vec<usize>,
    neg_items: Vec<u32>,
}

impl FastTables {
    fn build(data: &Interactions) -> FastTables {
        let n_items = data.n_items() as u32;
        let mut users = Vec::new();
        let mut neg_ptrs = Vec::with_capacity(data.n_users() + 1);
        let mut neg_items = Vec::new();
        neg_ptrs.push(0);

        for u in 0..data.n_users() as u32 {
            let start = neg_items.len();
            let pos = data.user_items(u);
            // positives are sorted, so one merge pass finds the complement
            let mut pi = 0;
            for i in 0..n_items {
                while pi < pos.len() && pos[pi] < i {
                    pi += 1;
                }
                if pi < pos.len() && pos[pi] == i {
                    continue;
                }
                if data.item_count(i) > 0 {
                    neg_items.push(i);
                }
            }
            if !pos.is_empty() && neg_items.len() > start {
                users.push(u);
            } else if !pos.is_empty() {
                warn!("user {} has no eligible negative items", u);
            }
            neg_ptrs.push(neg_items.len());
        }

        FastTables {
            users,
            neg_ptrs,
            neg_items,
        }
    }

    fn negatives(&self, user: u32) -> &[u32] {
        let u = user as usize;
        &self.neg_items[self.neg_ptrs[u]..self.neg_ptrs[u + 1]]
    }
}

/// Samples a uniform positive item and a uniform eligible negative item.
///
/// An eligible negative for a user is an item they have not interacted with
/// but someone else has.  A user is sampled only if they have at least one
/// positive and at least one eligible negative; fast and rejection modes use
/// the same eligibility and yield the same distribution.
#[derive(Debug, Clone)]
pub struct UniformSampler {
    n_users: u32,
    n_items: u32,
    n_popular: usize,
    fast: Option<FastTables>,
}

impl UniformSampler {
    /// Set up a sampler, choosing fast mode if the tables fit the memory budget.
    pub fn new(data: &Interactions, config: &SamplingConfig) -> Result<UniformSampler> {
        let n_users = data.n_users();
        let n_items = data.n_items();
        let n_popular = (0..n_items as u32)
            .filter(|i| data.item_count(*i) > 0)
            .count();

        let eligible = (0..n_users as u32)
            .filter(|u| is_eligible(data.user_count(*u), n_popular))
            .count();
        if eligible == 0 {
            return Err(Error::NoEligibleUser);
        }

        let est = fast_memory_estimate(n_users, n_items);
        let fast = if est <= config.fast_sampling_budget {
            debug!(
                "using fast sampling ({} bytes, {} eligible users)",
                est, eligible
            );
            Some(FastTables::build(data))
        } else {
            debug!(
                "fast sampling needs {} bytes, over budget of {}; using rejection sampling",
                est, config.fast_sampling_budget
            );
            None
        };

        Ok(UniformSampler {
            n_users: n_users as u32,
            n_items: n_items as u32,
            n_popular,
            fast,
        })
    }

    pub fn is_fast(&self) -> bool {
        self.fast.is_some()
    }

    /// Draw a negative item for a user by the configured mode.
    pub fn sample_negative<R: Rng + ?Sized>(
        &self,
        data: &Interactions,
        user: u32,
        rng: &mut R,
    ) -> u32 {
        match &self.fast {
            Some(tables) => {
                let negs = tables.negatives(user);
                negs[rng.random_range(0..negs.len())]
            }
            None => loop {
                let j = rng.random_range(0..self.n_items);
                if !data.contains(user, j) && data.item_count(j) > 0 {
                    break j;
                }
            },
        }
    }

    /// Draw a positive item for a user.
    pub fn sample_positive<R: Rng + ?Sized>(
        &self,
        data: &Interactions,
        user: u32,
        rng: &mut R,
    ) -> u32 {
        let pos = data.user_items(user);
        pos[rng.random_range(0..pos.len())]
    }
}

impl PairSampler for UniformSampler {
    fn sample_user<R: Rng + ?Sized>(&self, data: &Interactions, rng: &mut R) -> u32 {
        match &self.fast {
            Some(tables) => tables.users[rng.random_range(0..tables.users.len())],
            None => loop {
                let u = rng.random_range(0..self.n_users);
                if is_eligible(data.user_count(u), self.n_popular) {
                    break u;
                }
            },
        }
    }

    fn sample_pair<R: Rng + ?Sized>(
        &self,
        data: &Interactions,
        user: u32,
        rng: &mut R,
    ) -> (u32, u32) {
        let i = self.sample_positive(data, user, rng);
        let j = self.sample_negative(data, user, rng);
        (i, j)
    }
}

/// Memory needed by dense per-user tables, in bytes.
pub fn fast_memory_estimate(n_users: usize, n_items: usize) -> usize {
    n_users.saturating_mul(n_items).saturating_mul(4)
}

// positives are always popular, so the popular items the user lacks are the negatives
fn is_eligible(count: usize, n_popular: usize) -> bool {
    count > 0 && count < n_popular
}
