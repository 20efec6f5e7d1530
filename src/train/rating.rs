// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Pointwise rating-error training with optional side information.

use std::sync::OnceLock;

use log::*;
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand_pcg::Pcg64;

use crate::config::{Aggregation, Config, PointwiseLoss, RatingConfig};
use crate::data::{AttributeSpaces, Interactions, RelationMatrix};
use crate::errors::{Error, Result};
use crate::model::{make_rng, normal_matrix, FactorModel, ModelArchive};
use crate::sampling::RatingOrder;
use crate::scoring::{FactorSource, Predictor, UNKNOWN_SCORE};

use super::{sigmoid, AttributeBiasTerms, InteractionTerm, LearnRate, RelationBias, Regularizer, Trainer};

const ARCHIVE_KIND: &str = "rating";

/// Side information attached to a rating model.
#[derive(Debug, Clone, Default)]
pub struct SideInfo {
    pub user_attributes: Option<AttributeSpaces>,
    pub item_attributes: Option<AttributeSpaces>,
    /// Learn user-attribute × item-attribute weights (needs both attribute sides).
    pub interaction: bool,
    pub relations: Option<RelationMatrix>,
}

impl SideInfo {
    pub fn with_user_attributes(mut self, spaces: AttributeSpaces) -> SideInfo {
        self.user_attributes = Some(spaces);
        self
    }

    pub fn with_item_attributes(mut self, spaces: AttributeSpaces) -> SideInfo {
        self.item_attributes = Some(spaces);
        self
    }

    pub fn with_interaction(mut self) -> SideInfo {
        self.interaction = true;
        self
    }

    pub fn with_relations(mut self, relations: RelationMatrix) -> SideInfo {
        self.relations = Some(relations);
        self
    }
}

/// A user fitted against a frozen model from their ratings alone.
#[derive(Debug, Clone)]
pub struct FoldedUser {
    pub bias: f32,
    pub vector: Array1<f32>,
}

/// Trains biases, factors, and side-information terms against observed ratings.
///
/// The raw score sums the global mean, user and item biases, the dot product
/// of the user vector (optionally SVD++-augmented) with the item factor, and
/// every attached side term.  Gradients use the error of the raw score;
/// predictions are clamped to the rating range only on output.
pub struct RatingTrainer {
    config: RatingConfig,
    data: Interactions,
    model: FactorModel,
    implicit: Option<Array2<f32>>,
    user_terms: Option<AttributeBiasTerms>,
    item_terms: Option<AttributeBiasTerms>,
    interaction: Option<InteractionTerm>,
    relations: Option<RelationBias>,
    reg_u: Regularizer,
    reg_i: Regularizer,
    reg_y: Regularizer,
    bounds: (f32, f32),
    order: RatingOrder,
    rate: LearnRate,
    rng: Pcg64,
    iterations: usize,
    user_cache: OnceLock<Array2<f32>>,
}

impl RatingTrainer {
    pub fn new(config: RatingConfig, data: Interactions, side: SideInfo) -> Result<RatingTrainer> {
        config.validate()?;
        let ratings = data.ratings().ok_or(Error::MissingRatings)?;
        let observed = data.rating_range().unwrap_or((0.0, 0.0));
        let bounds = (
            config.min_rating.unwrap_or(observed.0),
            config.max_rating.unwrap_or(observed.1),
        );
        debug!(
            "rating model over {} ratings in [{}, {}]",
            ratings.len(),
            bounds.0,
            bounds.1
        );

        if side.interaction && (side.user_attributes.is_none() || side.item_attributes.is_none()) {
            return Err(Error::InvalidConfig(
                "the interaction term needs both user and item attributes".into(),
            ));
        }

        let (data_users, data_items) = (data.n_users(), data.n_items());
        let mut n_users = data_users;
        let mut n_items = data_items;
        if let Some(ua) = &side.user_attributes {
            n_users = n_users.max(ua.max_rows());
        }
        if let Some(ia) = &side.item_attributes {
            n_items = n_items.max(ia.max_rows());
        }
        if let Some(rel) = &side.relations {
            n_users = n_users.max(rel.n_rows()).max(rel.n_cols());
        }
        let data = data.with_min_dims(n_users, n_items);

        let mut rng = make_rng(config.seed);
        let mut model = FactorModel::random(data_users, data_items, &config.factors, &mut rng)?;
        model.grow_users(n_users)?;
        model.grow_items(n_items)?;
        model.global_bias = initial_global_bias(&config, &data, bounds);

        let implicit = match config.aggregation {
            Aggregation::SvdPlusPlus => Some(normal_matrix(
                n_items,
                config.factors.num_factors,
                config.factors.init_mean,
                config.factors.init_stddev,
                &mut rng,
            )?),
            Aggregation::Plain => None,
        };

        let interaction = match (&side.user_attributes, &side.item_attributes) {
            (Some(ua), Some(ia)) if side.interaction => {
                Some(InteractionTerm::new(ua.clone(), ia.primary.clone()))
            }
            _ => None,
        };
        let user_terms = side.user_attributes.map(AttributeBiasTerms::new);
        let item_terms = side.item_attributes.map(AttributeBiasTerms::new);
        let relations = side.relations.map(RelationBias::new);

        let freq = config.frequency_regularization;
        let reg = config.regularization;
        let user_counts: Vec<usize> = (0..n_users as u32).map(|u| data.user_count(u)).collect();
        let item_counts: Vec<usize> = (0..n_items as u32).map(|i| data.item_count(i)).collect();
        let reg_u = Regularizer::select(reg, freq, user_counts.iter().copied());
        let reg_i = Regularizer::select(reg, freq, item_counts.iter().copied());
        let reg_y = Regularizer::implicit(reg, freq, item_counts.iter().copied());

        let order = RatingOrder::new(data.len());
        let rate = LearnRate::new(config.learn_rate, &config.schedule);

        Ok(RatingTrainer {
            config,
            data,
            model,
            implicit,
            user_terms,
            item_terms,
            interaction,
            relations,
            reg_u,
            reg_i,
            reg_y,
            bounds,
            order,
            rate,
            rng,
            iterations: 0,
            user_cache: OnceLock::new(),
        })
    }

    pub fn model(&self) -> &FactorModel {
        &self.model
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn data(&self) -> &Interactions {
        &self.data
    }

    /// One gradient step on a rating record; returns the squared error.
    pub fn step(&mut self, record: usize, lr: f32) -> f64 {
        self.user_cache.take();
        let rec = self.data.record(record);
        let (u, i) = (rec.user, rec.item);
        let rating = rec.rating.unwrap_or(self.model.global_bias);
        let (ui, ii) = (u as usize, i as usize);

        let items = self.data.user_items(u);
        let norm = if items.is_empty() {
            1.0
        } else {
            (items.len() as f32).sqrt()
        };
        let u_vec = user_vector(&self.model, self.implicit.as_ref(), items, u);

        let raw = self.model.global_bias
            + self.model.user_bias[ui]
            + self.model.item_bias[ii]
            + u_vec.dot(&self.model.item_vector(i))
            + self.side_contribution(u, i);
        let (pred, scale) = self.output(raw);
        let err = rating - pred;
        let grad = err * scale;

        let blr = self.config.bias_learn_rate * lr;
        let bias_reg = self.config.bias_reg;
        let reg = self.config.regularization;
        let reg_u = self.reg_u.get(u);
        let reg_i = self.reg_i.get(i);

        let b = self.model.user_bias[ui];
        self.model.user_bias[ui] += blr * (grad - bias_reg * reg_u * b);
        let b = self.model.item_bias[ii];
        self.model.item_bias[ii] += blr * (grad - bias_reg * reg_i * b);

        for f in 0..self.model.n_factors() {
            let p_f = self.model.user_factors[(ui, f)];
            let q_f = self.model.item_factors[(ii, f)];
            self.model.user_factors[(ui, f)] += lr * (grad * q_f - reg_u * p_f);
            self.model.item_factors[(ii, f)] += lr * (grad * u_vec[f] - reg_i * q_f);
            if let Some(y) = self.implicit.as_mut() {
                let common = grad * q_f / norm;
                for k in items {
                    let y_kf = y[(*k as usize, f)];
                    y[(*k as usize, f)] += lr * (common - self.reg_y.get(*k) * y_kf);
                }
            }
        }

        if let Some(t) = self.user_terms.as_mut() {
            t.update(u, grad, blr, bias_reg * reg);
        }
        if let Some(t) = self.item_terms.as_mut() {
            t.update(i, grad, blr, bias_reg * reg);
        }
        if let Some(t) = self.interaction.as_mut() {
            t.update(u, i, grad, lr, reg);
        }
        if let Some(t) = self.relations.as_mut() {
            t.update(u, grad, blr, bias_reg * reg);
        }

        (err * err) as f64
    }

    fn side_contribution(&self, user: u32, item: u32) -> f32 {
        self.user_side(user) + self.item_side(item)
            + self
                .interaction
                .as_ref()
                .map(|t| t.contribution(user, item))
                .unwrap_or(0.0)
    }

    fn user_side(&self, user: u32) -> f32 {
        self.user_terms.as_ref().map(|t| t.contribution(user)).unwrap_or(0.0)
            + self.relations.as_ref().map(|r| r.contribution(user)).unwrap_or(0.0)
    }

    fn item_side(&self, item: u32) -> f32 {
        self.item_terms.as_ref().map(|t| t.contribution(item)).unwrap_or(0.0)
    }

    /// Map a raw score to a prediction and the derivative scale of that map.
    fn output(&self, raw: f32) -> (f32, f32) {
        match self.config.loss {
            PointwiseLoss::Squared => (raw, 1.0),
            PointwiseLoss::Logistic => {
                let (lo, hi) = self.bounds;
                let range = hi - lo;
                let s = sigmoid(raw as f64) as f32;
                (lo + s * range, s * (1.0 - s) * range)
            }
        }
    }

    fn observed_user(&self, user: u32) -> bool {
        self.model.has_user(user) && self.data.user_count(user) > 0
    }

    fn observed_item(&self, item: u32) -> bool {
        self.model.has_item(item) && self.data.item_count(item) > 0
    }

    fn user_has_side(&self, user: u32) -> bool {
        let attrs = self
            .user_terms
            .as_ref()
            .map(|t| t.spaces().spaces().any(|s| !s.row(user).is_empty()))
            .unwrap_or(false);
        attrs || self.relations.as_ref().map(|r| r.has_relations(user)).unwrap_or(false)
    }

    fn item_has_side(&self, item: u32) -> bool {
        self.item_terms
            .as_ref()
            .map(|t| t.spaces().spaces().any(|s| !s.row(item).is_empty()))
            .unwrap_or(false)
    }

    fn user_vectors(&self) -> &Array2<f32> {
        self.user_cache.get_or_init(|| {
            let mut out = Array2::zeros(self.model.user_factors.dim());
            for u in 0..self.model.n_users() as u32 {
                let v = user_vector(&self.model, self.implicit.as_ref(), self.data.user_items(u), u);
                out.row_mut(u as usize).assign(&v);
            }
            out
        })
    }

    /// Raw score with the given vectors; biases and dot products only count
    /// for entities with observed ratings.
    fn raw_with(
        &self,
        user: u32,
        item: u32,
        user_vec: Option<ArrayView1<'_, f32>>,
        item_vec: Option<ArrayView1<'_, f32>>,
    ) -> f32 {
        let mut raw = self.model.global_bias + self.user_side(user) + self.item_side(item);
        if self.observed_user(user) {
            raw += self.model.user_bias[user as usize];
        }
        if self.observed_item(item) {
            raw += self.model.item_bias[item as usize];
        }
        if let Some(t) = &self.interaction {
            raw += t.contribution(user, item);
        }
        if let (Some(uv), Some(iv)) = (user_vec, item_vec) {
            raw += uv.dot(&iv);
        }
        raw
    }

    /// Fit a new user's bias and factors against the frozen item side.
    pub fn fold_in(&self, ratings: &[(u32, f32)]) -> FoldedUser {
        let mut rng = make_rng(self.config.seed);
        let f = self.model.n_factors();
        let known: Vec<(u32, f32)> = ratings
            .iter()
            .copied()
            .filter(|(i, _)| self.observed_item(*i))
            .collect();
        if known.is_empty() {
            return FoldedUser {
                bias: 0.0,
                vector: Array1::zeros(f),
            };
        }

        let (mean, sd) = (self.config.factors.init_mean, self.config.factors.init_stddev);
        let mut p = match normal_matrix(1, f, mean, sd, &mut rng) {
            Ok(m) => m.row(0).to_owned(),
            Err(_) => Array1::zeros(f),
        };
        let mut implicit = Array1::zeros(f);
        if let Some(y) = &self.implicit {
            let norm = (known.len() as f32).sqrt();
            for (i, _) in &known {
                implicit.scaled_add(1.0 / norm, &y.row(*i as usize));
            }
        }

        let lr = self.config.learn_rate;
        let blr = self.config.bias_learn_rate * lr;
        let reg = self.config.regularization;
        let bias_reg = self.config.bias_reg;
        let mut bias = 0.0;
        let mut order = known.clone();
        for _ in 0..self.config.num_iter {
            order.shuffle(&mut rng);
            for (i, r) in &order {
                let q = self.model.item_vector(*i);
                let u_vec = &p + &implicit;
                let raw = self.model.global_bias
                    + bias
                    + self.model.item_bias[*i as usize]
                    + self.item_side(*i)
                    + u_vec.dot(&q);
                let (pred, scale) = self.output(raw);
                let grad = (r - pred) * scale;
                bias += blr * (grad - bias_reg * reg * bias);
                p.zip_mut_with(&q, |p_f, q_f| *p_f += lr * (grad * q_f - reg * *p_f));
            }
        }

        FoldedUser {
            bias,
            vector: p + implicit,
        }
    }

    /// Rating prediction for a folded-in user.
    pub fn predict_folded(&self, user: &FoldedUser, item: u32) -> f32 {
        if !self.observed_item(item) && !self.item_has_side(item) {
            return UNKNOWN_SCORE;
        }
        let mut raw = self.model.global_bias + user.bias + self.item_side(item);
        if self.observed_item(item) {
            raw += self.model.item_bias[item as usize] + user.vector.dot(&self.model.item_vector(item));
        }
        let (lo, hi) = self.bounds;
        self.output(raw).0.clamp(lo, hi)
    }

    pub fn to_archive(&self) -> ModelArchive {
        let mut ar = self.model.to_archive(ARCHIVE_KIND);
        if let Some(y) = &self.implicit {
            ar.push_matrix("implicit_embeddings", y);
        }
        if let Some(t) = &self.user_terms {
            t.save(&mut ar, "user_attribute");
        }
        if let Some(t) = &self.item_terms {
            t.save(&mut ar, "item_attribute");
        }
        if let Some(t) = &self.interaction {
            t.save(&mut ar);
        }
        if let Some(t) = &self.relations {
            t.save(&mut ar);
        }
        ar.set_scalar("min_rating", self.bounds.0);
        ar.set_scalar("max_rating", self.bounds.1);
        ar
    }

    /// Restore learned parameters from an archive of a compatible trainer.
    pub fn load_archive(&mut self, ar: &ModelArchive) -> Result<()> {
        ar.expect_kind(ARCHIVE_KIND)?;
        let model = FactorModel::from_archive(ar)?;
        if model.user_factors.dim() != self.model.user_factors.dim() {
            return Err(Error::shape(
                "user factors",
                self.model.user_factors.len(),
                model.user_factors.len(),
            ));
        }
        if model.item_factors.dim() != self.model.item_factors.dim() {
            return Err(Error::shape(
                "item factors",
                self.model.item_factors.len(),
                model.item_factors.len(),
            ));
        }
        if let Some(y) = &self.implicit {
            let loaded = ar.matrix("implicit_embeddings")?;
            if loaded.dim() != y.dim() {
                return Err(Error::shape("implicit embeddings", y.len(), loaded.len()));
            }
            self.implicit = Some(loaded);
        }
        if let Some(t) = self.user_terms.as_mut() {
            t.load(ar, "user_attribute")?;
        }
        if let Some(t) = self.item_terms.as_mut() {
            t.load(ar, "item_attribute")?;
        }
        if let Some(t) = self.interaction.as_mut() {
            t.load(ar)?;
        }
        if let Some(t) = self.relations.as_mut() {
            t.load(ar)?;
        }
        self.bounds = (ar.scalar("min_rating")?, ar.scalar("max_rating")?);
        self.model = model;
        self.user_cache.take();
        Ok(())
    }
}

impl Trainer for RatingTrainer {
    fn iterate(&mut self) -> f64 {
        let lr = self.rate.current();
        let order = self.order.next_pass(&mut self.rng).to_vec();
        let mut sse = 0.0;
        for idx in &order {
            sse += self.step(*idx, lr);
        }
        let rmse = if order.is_empty() {
            0.0
        } else {
            (sse / order.len() as f64).sqrt()
        };
        self.rate.end_pass(rmse);
        self.iterations += 1;
        rmse
    }

    fn iterations(&self) -> usize {
        self.iterations
    }

    fn samples_per_iteration(&self) -> usize {
        self.order.len()
    }

    fn learn_rate(&self) -> f32 {
        self.rate.current()
    }

    fn model_bytes(&self) -> usize {
        self.model.memory_size()
            + self.implicit.as_ref().map(|y| y.len() * 4).unwrap_or(0)
            + self.user_terms.as_ref().map(|t| t.memory_size()).unwrap_or(0)
            + self.item_terms.as_ref().map(|t| t.memory_size()).unwrap_or(0)
            + self.interaction.as_ref().map(|t| t.memory_size()).unwrap_or(0)
            + self.relations.as_ref().map(|t| t.memory_size()).unwrap_or(0)
    }
}

impl Predictor for RatingTrainer {
    fn score(&self, user: u32, item: u32) -> f32 {
        let u_ok = self.observed_user(user) || self.user_has_side(user);
        let i_ok = self.observed_item(item) || self.item_has_side(item);
        if !u_ok || !i_ok {
            return UNKNOWN_SCORE;
        }
        let uv = self.user_vector(user);
        let iv = self.item_vector(item);
        let raw = self.raw_with(
            user,
            item,
            uv.as_ref().map(|v| v.view()),
            iv.as_ref().map(|v| v.view()),
        );
        self.output(raw).0
    }

    fn rating_bounds(&self) -> Option<(f32, f32)> {
        Some(self.bounds)
    }
}

impl FactorSource for RatingTrainer {
    fn n_factors(&self) -> usize {
        self.model.n_factors()
    }

    fn n_users(&self) -> usize {
        self.model.n_users()
    }

    fn n_items(&self) -> usize {
        self.model.n_items()
    }

    fn user_vector(&self, user: u32) -> Option<Array1<f32>> {
        if self.observed_user(user) {
            Some(self.user_vectors().row(user as usize).to_owned())
        } else {
            None
        }
    }

    fn item_vector(&self, item: u32) -> Option<Array1<f32>> {
        if self.observed_item(item) {
            Some(self.model.item_vector(item).to_owned())
        } else {
            None
        }
    }

    fn user_observed(&self, user: u32) -> bool {
        self.observed_user(user)
    }

    fn item_observed(&self, item: u32) -> bool {
        self.observed_item(item)
    }

    fn item_bias(&self, item: u32) -> f32 {
        if self.observed_item(item) {
            self.model.item_bias[item as usize]
        } else {
            0.0
        }
    }

    fn score_vectors(
        &self,
        user: u32,
        item: u32,
        user_vec: ArrayView1<'_, f32>,
        item_vec: ArrayView1<'_, f32>,
    ) -> f32 {
        let raw = self.raw_with(user, item, Some(user_vec), Some(item_vec));
        self.output(raw).0
    }
}

fn user_vector(
    model: &FactorModel,
    implicit: Option<&Array2<f32>>,
    items: &[u32],
    user: u32,
) -> Array1<f32> {
    let mut v = model.user_vector(user).to_owned();
    if let Some(y) = implicit {
        if !items.is_empty() {
            let scale = 1.0 / (items.len() as f32).sqrt();
            for k in items {
                v.scaled_add(scale, &y.row(*k as usize));
            }
        }
    }
    v
}

fn initial_global_bias(config: &RatingConfig, data: &Interactions, bounds: (f32, f32)) -> f32 {
    let mean = data.rating_mean().unwrap_or(0.0);
    match config.loss {
        PointwiseLoss::Squared => mean,
        PointwiseLoss::Logistic => {
            let range = bounds.1 - bounds.0;
            let frac = if range > 0.0 {
                ((mean - bounds.0) / range).clamp(0.01, 0.99)
            } else {
                0.5
            };
            (frac / (1.0 - frac)).ln()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FactorConfig;
    use crate::data::BooleanMatrix;

    /// Users 0-4 rate everything 5, users 5-9 rate everything 1.
    fn polarized() -> Interactions {
        let mut triples = Vec::new();
        for u in 0..10u32 {
            for i in 0..10u32 {
                triples.push((u, i, if u < 5 { 5.0 } else { 1.0 }));
            }
        }
        Interactions::explicit(triples)
    }

    fn config() -> RatingConfig {
        RatingConfig {
            factors: FactorConfig {
                num_factors: 3,
                ..FactorConfig::default()
            },
            learn_rate: 0.05,
            ..RatingConfig::default()
        }
    }

    #[test]
    fn test_requires_ratings() {
        let data = Interactions::implicit(vec![(0, 0), (1, 1)]);
        let res = RatingTrainer::new(config(), data, SideInfo::default());
        assert!(matches!(res, Err(Error::MissingRatings)));
    }

    #[test]
    fn test_clamped_only_on_output() {
        let cfg = RatingConfig {
            min_rating: Some(2.9),
            max_rating: Some(3.1),
            ..config()
        };
        let mut t = RatingTrainer::new(cfg, polarized(), SideInfo::default()).expect("valid trainer");
        t.train(30);
        let mut outside = 0;
        for u in 0..10 {
            for i in 0..10 {
                let raw = t.score(u, i);
                let pred = t.predict(u, i);
                assert!((2.9..=3.1).contains(&pred));
                if !(2.9..=3.1).contains(&raw) {
                    outside += 1;
                }
            }
        }
        assert!(outside > 50);
        assert!(t.score(0, 0) > 4.0);
        assert!(t.score(9, 0) < 2.0);
    }

    #[test]
    fn test_loss_decreases() {
        let mut t = RatingTrainer::new(config(), polarized(), SideInfo::default()).expect("valid trainer");
        let first = t.iterate();
        let stats = t.train(20);
        assert!(stats.last_loss.unwrap_or(f64::INFINITY) < first);
        assert_eq!(stats.samples, 2000);
    }

    #[test]
    fn test_attribute_cold_start() {
        let mut rows: Vec<Vec<u32>> = (0..10).map(|u| vec![if u < 5 { 0 } else { 1 }]).collect();
        rows.push(vec![0]);
        rows.push(vec![1]);
        let attrs = AttributeSpaces::new(BooleanMatrix::from_rows(&rows, 2));
        let side = SideInfo::default().with_user_attributes(attrs);
        let mut t = RatingTrainer::new(config(), polarized(), side).expect("valid trainer");
        t.train(30);

        // users 10 and 11 have no ratings, only attributes
        assert!(t.user_vector(10).is_none());
        assert!(t.score(10, 3) > 3.5);
        assert!(t.score(11, 3) < 2.5);
        assert_eq!(t.score(12, 3), UNKNOWN_SCORE);
        assert_eq!(t.score(0, 40), UNKNOWN_SCORE);
    }

    #[test]
    fn test_relations_and_interaction() {
        let user_attrs = AttributeSpaces::new(BooleanMatrix::from_rows(
            &(0..11).map(|u| vec![if u < 5 || u == 10 { 0 } else { 1 }]).collect::<Vec<_>>(),
            2,
        ));
        let item_attrs = AttributeSpaces::new(BooleanMatrix::from_rows(
            &(0..10).map(|i| vec![i % 2]).collect::<Vec<_>>(),
            2,
        ));
        // the high raters know each other, and user 10 knows all of them
        let pairs = (0..5u32)
            .flat_map(|u| (0..5u32).filter(move |v| *v != u).map(move |v| (u, v)))
            .chain((0..5).map(|v| (10, v)));
        let relations = BooleanMatrix::from_pairs(pairs, 11, 11);
        let side = SideInfo::default()
            .with_user_attributes(user_attrs)
            .with_item_attributes(item_attrs)
            .with_interaction()
            .with_relations(relations);
        let mut t = RatingTrainer::new(config(), polarized(), side).expect("valid trainer");
        let stats = t.train(10);
        assert!(stats.last_loss.map(|l| l.is_finite()).unwrap_or(false));
        assert!(t.score(10, 0) > 3.0);

        let ar = ModelArchive::from_json(&t.to_archive().to_json().expect("json")).expect("archive");
        let before: Vec<f32> = (0..10).map(|i| t.score(10, i)).collect();
        t.train(2);
        t.load_archive(&ar).expect("compatible archive");
        let after: Vec<f32> = (0..10).map(|i| t.score(10, i)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_interaction_needs_both_sides() {
        let side = SideInfo::default().with_interaction();
        let res = RatingTrainer::new(config(), polarized(), side);
        assert!(matches!(res, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_logistic_in_range() {
        let cfg = RatingConfig {
            loss: PointwiseLoss::Logistic,
            learn_rate: 0.1,
            ..config()
        };
        let mut t = RatingTrainer::new(cfg, polarized(), SideInfo::default()).expect("valid trainer");
        let first = t.iterate();
        let stats = t.train(20);
        assert!(stats.last_loss.unwrap_or(f64::INFINITY) < first);
        for u in 0..10 {
            for i in 0..10 {
                let s = t.score(u, i);
                assert!(s > 1.0 && s < 5.0);
            }
        }
        assert!(t.score(0, 0) > t.score(9, 0));
    }

    #[test]
    fn test_svdpp_frequency_reg() {
        let cfg = RatingConfig {
            aggregation: Aggregation::SvdPlusPlus,
            frequency_regularization: true,
            ..config()
        };
        let mut t = RatingTrainer::new(cfg, polarized(), SideInfo::default()).expect("valid trainer");
        let first = t.iterate();
        let stats = t.train(10);
        assert!(stats.last_loss.unwrap_or(f64::INFINITY) < first);
        assert!(stats.model_bytes > t.model().memory_size());
    }

    #[test]
    fn test_direct_steps_refresh_scores() {
        let cfg = RatingConfig {
            aggregation: Aggregation::SvdPlusPlus,
            ..config()
        };
        let mut t = RatingTrainer::new(cfg.clone(), polarized(), SideInfo::default()).expect("valid trainer");
        t.train(2);
        let before = t.score(0, 0);
        for _ in 0..50 {
            t.step(0, 0.05);
        }
        let after = t.score(0, 0);
        assert_ne!(before, after);

        let mut fresh = RatingTrainer::new(cfg, polarized(), SideInfo::default()).expect("valid trainer");
        fresh.load_archive(&t.to_archive()).expect("compatible archive");
        assert_eq!(after, fresh.score(0, 0));
    }

    #[test]
    fn test_fold_in() {
        let mut t = RatingTrainer::new(config(), polarized(), SideInfo::default()).expect("valid trainer");
        t.train(30);
        let high: Vec<(u32, f32)> = (0..10).map(|i| (i, 5.0)).collect();
        let low: Vec<(u32, f32)> = (0..10).map(|i| (i, 1.0)).collect();
        let hu = t.fold_in(&high);
        let lu = t.fold_in(&low);
        assert!(t.predict_folded(&hu, 3) > 4.0);
        assert!(t.predict_folded(&lu, 3) < 2.0);
        assert_eq!(t.predict_folded(&hu, 99), UNKNOWN_SCORE);

        let nobody = t.fold_in(&[(99, 4.0)]);
        assert_eq!(nobody.bias, 0.0);
    }
}
