// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Per-entity regularization weights.

/// Regularization strength for each entity of one kind.
///
/// Chosen once per model; every update touching an entity uses its weight.
#[derive(Debug, Clone)]
pub enum Regularizer {
    Constant(f32),
    PerEntity(Vec<f32>),
}

impl Regularizer {
    /// Scale by `1/sqrt(count)`; entities never observed keep the base weight.
    pub fn frequency<I: IntoIterator<Item = usize>>(base: f32, counts: I) -> Regularizer {
        Regularizer::PerEntity(
            counts
                .into_iter()
                .map(|c| {
                    if c > 0 {
                        base / (c as f32).sqrt()
                    } else {
                        base
                    }
                })
                .collect(),
        )
    }

    /// Either constant or frequency-scaled, by a model's frequency flag.
    pub fn select<I: IntoIterator<Item = usize>>(
        base: f32,
        frequency: bool,
        counts: I,
    ) -> Regularizer {
        if frequency {
            Regularizer::frequency(base, counts)
        } else {
            Regularizer::Constant(base)
        }
    }

    /// Weights for implicit item embeddings: zero for items nobody has seen.
    pub fn implicit<I: IntoIterator<Item = usize>>(
        base: f32,
        frequency: bool,
        counts: I,
    ) -> Regularizer {
        Regularizer::PerEntity(
            counts
                .into_iter()
                .map(|c| match (c, frequency) {
                    (0, _) => 0.0,
                    (c, true) => base / (c as f32).sqrt(),
                    (_, false) => base,
                })
                .collect(),
        )
    }

    /// Weights for attribute embeddings, relaxed for rare attributes.
    pub fn attribute_popularity<I: IntoIterator<Item = u32>>(
        base: f32,
        frequency: bool,
        counts: I,
    ) -> Regularizer {
        if !frequency {
            return Regularizer::Constant(base);
        }
        Regularizer::PerEntity(
            counts
                .into_iter()
                .map(|c| base / (1.0 + (-0.005 * c as f64).exp()) as f32)
                .collect(),
        )
    }

    /// Weight for an entity; IDs beyond a per-entity table are unregularized.
    pub fn get(&self, id: u32) -> f32 {
        match self {
            Regularizer::Constant(w) => *w,
            Regularizer::PerEntity(ws) => ws.get(id as usize).copied().unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency() {
        let reg = Regularizer::frequency(0.4, vec![4, 0, 16]);
        assert_eq!(reg.get(0), 0.2);
        assert_eq!(reg.get(1), 0.4);
        assert_eq!(reg.get(2), 0.1);
        assert_eq!(Regularizer::select(0.4, false, vec![4]).get(0), 0.4);
    }

    #[test]
    fn test_implicit() {
        let reg = Regularizer::implicit(2.0, true, vec![0, 4]);
        assert_eq!(reg.get(0), 0.0);
        assert_eq!(reg.get(1), 1.0);
        let reg = Regularizer::implicit(2.0, false, vec![0, 4]);
        assert_eq!(reg.get(0), 0.0);
        assert_eq!(reg.get(1), 2.0);
    }

    #[test]
    fn test_attribute_popularity() {
        let reg = Regularizer::attribute_popularity(20.0, true, vec![0, 1000]);
        assert!((reg.get(0) - 10.0).abs() < 1e-5);
        assert!(reg.get(1) > 19.8);
        assert_eq!(Regularizer::attribute_popularity(20.0, false, vec![0]).get(0), 20.0);
    }
}
