// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Scoring trained models, including cold-start scoring through an
//! attribute mapper.

use std::cmp::Reverse;

use log::*;
use ndarray::{Array1, Array2, ArrayView1};
use ordered_float::NotNan;
use rayon::prelude::*;

use crate::config::MapperConfig;
use crate::data::{AttributeSpaces, Interactions};
use crate::errors::{Error, Result};
use crate::mapping::AttributeMapper;

/// Score returned for a user or item the model cannot score.
pub const UNKNOWN_SCORE: f32 = f32::MIN;

/// Test whether a score is the unknown-entity sentinel.
pub fn is_unknown(score: f32) -> bool {
    score == UNKNOWN_SCORE
}

/// A trained model that can score (user, item) pairs.
pub trait Predictor: Sync {
    /// Raw score of an item for a user, or [UNKNOWN_SCORE].
    fn score(&self, user: u32, item: u32) -> f32;

    /// Rating range that predictions are clamped to, if any.
    fn rating_bounds(&self) -> Option<(f32, f32)> {
        None
    }

    /// Score clamped to the rating bounds.  Unknown stays unknown.
    fn predict(&self, user: u32, item: u32) -> f32 {
        let s = self.score(user, item);
        match self.rating_bounds() {
            Some((lo, hi)) if !is_unknown(s) => s.clamp(lo, hi),
            _ => s,
        }
    }
}

/// A predictor built on user and item factor vectors.
///
/// Vectors are only available for entities the model has learned.
pub trait FactorSource: Predictor {
    fn n_factors(&self) -> usize;
    fn n_users(&self) -> usize;
    fn n_items(&self) -> usize;
    fn user_vector(&self, user: u32) -> Option<Array1<f32>>;
    fn item_vector(&self, item: u32) -> Option<Array1<f32>>;

    /// Whether the user has observed interactions.
    fn user_observed(&self, user: u32) -> bool {
        self.user_vector(user).is_some()
    }

    /// Whether the item has observed interactions.  A model may still have
    /// a vector for an unobserved item, e.g. one built from its attributes.
    fn item_observed(&self, item: u32) -> bool {
        self.item_vector(item).is_some()
    }

    fn global_bias(&self) -> f32 {
        0.0
    }

    fn user_bias(&self, _user: u32) -> f32 {
        0.0
    }

    fn item_bias(&self, _item: u32) -> f32 {
        0.0
    }

    /// Score a pair with the given vectors standing in for the learned ones.
    fn score_vectors(
        &self,
        user: u32,
        item: u32,
        user_vec: ArrayView1<'_, f32>,
        item_vec: ArrayView1<'_, f32>,
    ) -> f32 {
        self.global_bias() + self.user_bias(user) + self.item_bias(item) + user_vec.dot(&item_vec)
    }
}

/// Which side of the model is mapped from attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappedSide {
    Users,
    Items,
}

/// When to use mapped vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingPolicy {
    /// Use learned vectors when present, mapped vectors otherwise.
    #[default]
    Fallback,
    /// Always use mapped vectors for the mapped side.
    AttributeOnly,
}

/// Scores a factor model, substituting mapper output for one side.
pub struct MappedScorer<P: FactorSource> {
    base: P,
    side: MappedSide,
    policy: MappingPolicy,
    mapper: AttributeMapper,
}

impl<P: FactorSource> MappedScorer<P> {
    /// Fit a mapper from the attributes of one side to the model's vectors
    /// for that side.
    pub fn fit(
        base: P,
        side: MappedSide,
        attributes: AttributeSpaces,
        config: MapperConfig,
    ) -> Result<MappedScorer<P>> {
        let n = match side {
            MappedSide::Users => base.n_users(),
            MappedSide::Items => base.n_items(),
        };
        let mut targets = Array2::zeros((n, base.n_factors()));
        let mut observed = vec![false; n];
        for e in 0..n {
            let e32 = e as u32;
            let v = match side {
                MappedSide::Users if base.user_observed(e32) => base.user_vector(e32),
                MappedSide::Items if base.item_observed(e32) => base.item_vector(e32),
                _ => None,
            };
            if let Some(v) = v {
                targets.row_mut(e).assign(&v);
                observed[e] = true;
            }
        }
        debug!(
            "mapping {:?}: {} of {} entities have observed vectors",
            side,
            observed.iter().filter(|o| **o).count(),
            n
        );
        let mapper = AttributeMapper::fit(config, attributes, targets.view(), &observed)?;
        Ok(MappedScorer::new(base, side, mapper))
    }

    /// Wrap a model with an already-fitted mapper.
    pub fn new(base: P, side: MappedSide, mapper: AttributeMapper) -> MappedScorer<P> {
        MappedScorer {
            base,
            side,
            policy: MappingPolicy::default(),
            mapper,
        }
    }

    pub fn with_policy(mut self, policy: MappingPolicy) -> MappedScorer<P> {
        self.policy = policy;
        self
    }

    pub fn base(&self) -> &P {
        &self.base
    }

    pub fn mapper(&self) -> &AttributeMapper {
        &self.mapper
    }

    pub fn side(&self) -> MappedSide {
        self.side
    }

    fn mapped_vector(&self, entity: u32, learned: Option<Array1<f32>>) -> Option<Array1<f32>> {
        match (self.policy, learned) {
            (MappingPolicy::Fallback, Some(v)) => Some(v),
            _ if self.mapper.covers(entity) => Some(self.mapper.map(entity)),
            _ => None,
        }
    }
}

impl<P: FactorSource> Predictor for MappedScorer<P> {
    fn score(&self, user: u32, item: u32) -> f32 {
        let (uv, iv) = match self.side {
            MappedSide::Items => {
                let Some(uv) = self.base.user_vector(user) else {
                    return UNKNOWN_SCORE;
                };
                let Some(iv) = self.mapped_vector(item, self.base.item_vector(item)) else {
                    return UNKNOWN_SCORE;
                };
                (uv, iv)
            }
            MappedSide::Users => {
                let Some(iv) = self.base.item_vector(item) else {
                    return UNKNOWN_SCORE;
                };
                let Some(uv) = self.mapped_vector(user, self.base.user_vector(user)) else {
                    return UNKNOWN_SCORE;
                };
                (uv, iv)
            }
        };
        self.base.score_vectors(user, item, uv.view(), iv.view())
    }

    fn rating_bounds(&self) -> Option<(f32, f32)> {
        self.base.rating_bounds()
    }
}

/// Score many (user, item) pairs in parallel.
pub fn score_pairs<P: Predictor + ?Sized>(model: &P, users: &[u32], items: &[u32]) -> Result<Vec<f32>> {
    if users.len() != items.len() {
        return Err(Error::shape("item list", users.len(), items.len()));
    }
    Ok(users
        .par_iter()
        .zip(items.par_iter())
        .map(|(u, i)| model.predict(*u, *i))
        .collect())
}

/// Rank candidate items for a user, best first.
///
/// Unknown and NaN scores are dropped; ties are broken by item ID.  Items
/// the user has in `exclude` are skipped.
pub fn top_n<P: Predictor + ?Sized>(
    model: &P,
    user: u32,
    candidates: &[u32],
    n: usize,
    exclude: Option<&Interactions>,
) -> Vec<(u32, f32)> {
    let mut scored: Vec<(u32, NotNan<f32>)> = candidates
        .par_iter()
        .filter(|i| !exclude.map(|x| x.contains(user, **i)).unwrap_or(false))
        .filter_map(|i| {
            let s = model.predict(user, *i);
            if is_unknown(s) {
                None
            } else {
                NotNan::new(s).ok().map(|s| (*i, s))
            }
        })
        .collect();
    scored.par_sort_unstable_by_key(|(i, s)| (Reverse(*s), *i));
    scored.truncate(n);
    scored.into_iter().map(|(i, s)| (i, s.into_inner())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BprConfig;
    use crate::data::BooleanMatrix;
    use crate::train::{BprTrainer, Trainer};
    use ndarray::array;

    /// Fixed vectors for users 0-1 and items 0-1; item 2 is cold.
    struct Fixed {
        users: Array2<f32>,
        items: Array2<f32>,
    }

    impl Fixed {
        fn new() -> Fixed {
            Fixed {
                users: array![[1.0, 0.0], [0.0, 1.0]],
                items: array![[2.0, 0.0], [0.0, 3.0], [0.0, 0.0]],
            }
        }
    }

    impl Predictor for Fixed {
        fn score(&self, user: u32, item: u32) -> f32 {
            match (self.user_vector(user), self.item_vector(item)) {
                (Some(u), Some(i)) => u.dot(&i),
                _ => UNKNOWN_SCORE,
            }
        }

        fn rating_bounds(&self) -> Option<(f32, f32)> {
            Some((0.0, 2.5))
        }
    }

    impl FactorSource for Fixed {
        fn n_factors(&self) -> usize {
            2
        }

        fn n_users(&self) -> usize {
            2
        }

        fn n_items(&self) -> usize {
            3
        }

        fn user_vector(&self, user: u32) -> Option<Array1<f32>> {
            (user < 2).then(|| self.users.row(user as usize).to_owned())
        }

        fn item_vector(&self, item: u32) -> Option<Array1<f32>> {
            (item < 2).then(|| self.items.row(item as usize).to_owned())
        }
    }

    /// Like [Fixed], but item 2 has a derived vector and no interactions.
    struct Derived(Fixed);

    impl Predictor for Derived {
        fn score(&self, user: u32, item: u32) -> f32 {
            self.0.score(user, item)
        }
    }

    impl FactorSource for Derived {
        fn n_factors(&self) -> usize {
            2
        }

        fn n_users(&self) -> usize {
            2
        }

        fn n_items(&self) -> usize {
            3
        }

        fn user_vector(&self, user: u32) -> Option<Array1<f32>> {
            self.0.user_vector(user)
        }

        fn item_vector(&self, item: u32) -> Option<Array1<f32>> {
            if item == 2 {
                Some(array![1.0, 1.0])
            } else {
                self.0.item_vector(item)
            }
        }

        fn item_observed(&self, item: u32) -> bool {
            item < 2
        }
    }

    fn mapper() -> AttributeMapper {
        let attrs = BooleanMatrix::from_rows(&[vec![0], vec![1], vec![0]], 2);
        let mut m = AttributeMapper::new(MapperConfig::default(), AttributeSpaces::new(attrs), 2).expect("mapper");
        m.load_archive(&{
            let mut ar = crate::model::ModelArchive::new("attribute-mapper");
            ar.push_matrix("attribute_to_factor", &array![[5.0, 0.0], [0.0, 7.0], [0.5, 0.5]]);
            ar
        })
        .expect("weights");
        m
    }

    #[test]
    fn test_predict_clamps() {
        let f = Fixed::new();
        assert_eq!(f.score(1, 1), 3.0);
        assert_eq!(f.predict(1, 1), 2.5);
        assert_eq!(f.predict(0, 2), UNKNOWN_SCORE);
    }

    #[test]
    fn test_mapped_fallback() {
        let s = MappedScorer::new(Fixed::new(), MappedSide::Items, mapper());
        // learned vectors win when present
        assert_eq!(s.score(0, 0), 2.0);
        // item 2 maps to attribute 0 plus the bias row
        assert_eq!(s.score(0, 2), 5.5);
        assert_eq!(s.score(1, 2), 0.5);
        // beyond the attribute range
        assert_eq!(s.score(0, 3), UNKNOWN_SCORE);
        // the opposing entity is unknown
        assert_eq!(s.score(5, 2), UNKNOWN_SCORE);
        assert_eq!(s.score(0, 2), s.score(0, 2));
    }

    #[test]
    fn test_attribute_only() {
        let s = MappedScorer::new(Fixed::new(), MappedSide::Items, mapper()).with_policy(MappingPolicy::AttributeOnly);
        assert_eq!(s.score(0, 0), 5.5);
        assert_eq!(s.score(1, 1), 7.5);
        assert_eq!(s.predict(1, 1), 2.5);
    }

    #[test]
    fn test_score_pairs() {
        let f = Fixed::new();
        let scores = score_pairs(&f, &[0, 1, 0], &[0, 1, 2]).expect("equal lengths");
        assert_eq!(scores, vec![2.0, 2.5, UNKNOWN_SCORE]);
        assert!(score_pairs(&f, &[0], &[]).is_err());
    }

    #[test]
    fn test_top_n() {
        let f = Fixed::new();
        let s = MappedScorer::new(f, MappedSide::Items, mapper());
        let ranked = top_n(&s, 0, &[0, 1, 2, 3], 10, None);
        // item 2 scores 5.5 from its attributes, clamped to 2.5
        assert_eq!(ranked, vec![(2, 2.5), (0, 2.0), (1, 0.0)]);

        let seen = Interactions::implicit(vec![(0, 2)]);
        let ranked = top_n(&s, 0, &[0, 1, 2, 3], 1, Some(&seen));
        assert_eq!(ranked, vec![(0, 2.0)]);
    }

    #[test]
    fn test_fit_targets_need_interactions() {
        // only the unobserved item has attributes
        let attrs = BooleanMatrix::from_rows(&[vec![], vec![], vec![0]], 1);
        let res = MappedScorer::fit(
            Derived(Fixed::new()),
            MappedSide::Items,
            AttributeSpaces::new(attrs),
            MapperConfig::default(),
        );
        assert!(matches!(res, Err(Error::NoMappingExamples)));
    }

    #[test]
    fn test_cold_items_from_trained_model() {
        let data = Interactions::implicit(vec![(0, 0), (0, 1), (1, 1), (1, 2), (2, 3), (2, 0)]);
        let cfg = BprConfig {
            learn_rate: 0.1,
            seed: 11,
            ..BprConfig::default()
        };
        let mut trainer = BprTrainer::new(cfg, data, None).expect("valid trainer");
        trainer.train(20);
        assert_eq!(trainer.score(0, 4), UNKNOWN_SCORE);

        // item 4 has attributes but was never seen in training
        let attrs = BooleanMatrix::from_rows(&[vec![0], vec![0, 1], vec![1], vec![2], vec![2]], 3);
        let s = MappedScorer::fit(trainer, MappedSide::Items, AttributeSpaces::new(attrs), MapperConfig::default())
            .expect("mapper fit");
        assert_eq!(s.side(), MappedSide::Items);
        assert_eq!(s.mapper().report().restarts.len(), MapperConfig::default().num_restarts);

        let cold = s.score(0, 4);
        assert!(!is_unknown(cold));
        assert!(cold.is_finite());
        assert_eq!(cold.to_bits(), s.score(0, 4).to_bits());

        // learned items keep their trained scores
        assert_eq!(s.score(1, 2), s.base().score(1, 2));
        // beyond the attribute range, and an unseen user
        assert_eq!(s.score(0, 5), UNKNOWN_SCORE);
        assert_eq!(s.score(7, 4), UNKNOWN_SCORE);
    }
}
