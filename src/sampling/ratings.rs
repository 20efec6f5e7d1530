// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

use rand::{seq::SliceRandom, Rng};

/// Visit order over observed rating records, reshuffled every pass.
#[derive(Debug, Clone)]
pub struct RatingOrder {
    order: Vec<usize>,
}

impl RatingOrder {
    pub fn new(n_records: usize) -> RatingOrder {
        RatingOrder {
            order: (0..n_records).collect(),
        }
    }

    /// Shuffle and return the record indices for the next pass.
    pub fn next_pass<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &[usize] {
        self.order.shuffle(rng);
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

#[test]
fn test_pass_is_permutation() {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    let mut rng = Pcg64::seed_from_u64(3);
    let mut order = RatingOrder::new(50);
    let first = order.next_pass(&mut rng).to_vec();
    let mut sorted = first.clone();
    sorted.sort();
    assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    let second = order.next_pass(&mut rng).to_vec();
    assert_ne!(first, second);
}
