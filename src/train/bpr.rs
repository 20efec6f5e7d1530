// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Pairwise ranking (BPR) training.

use std::sync::{Arc, OnceLock};

use log::*;
use ndarray::{Array1, Array2};
use rand_pcg::Pcg64;

use crate::config::{Aggregation, BprConfig, Config, ItemSideInfo, NegativeSampling};
use crate::data::{BooleanMatrix, Interactions};
use crate::errors::{Error, Result};
use crate::model::{make_rng, normal_matrix, FactorModel, ModelArchive};
use crate::sampling::{AttributeBiasedSampler, PairSampler, Sampler, UniformSampler};
use crate::scoring::{FactorSource, Predictor, UNKNOWN_SCORE};

use super::{log_loss, BprLinearTrainer, LearnRate, Regularizer, Trainer};

const ARCHIVE_KIND: &str = "bpr";

/// Trains user and item factors and item biases by BPR.
///
/// The user vector is the user factor, optionally plus the normalized sum of
/// implicit embeddings of the user's items (SVD++).  The item vector is the
/// item factor, optionally plus the mean of the item's attribute embeddings
/// (GSVD++).  Only item biases are learned; user biases cancel in the margin.
pub struct BprTrainer {
    config: BprConfig,
    data: Arc<Interactions>,
    item_attributes: Option<BooleanMatrix>,
    model: FactorModel,
    implicit: Option<Array2<f32>>,
    attribute: Option<Array2<f32>>,
    reg_u: Regularizer,
    reg_i: Regularizer,
    reg_j: Regularizer,
    reg_x: Regularizer,
    reg_y: Regularizer,
    sampler: Sampler,
    rate: LearnRate,
    rng: Pcg64,
    iterations: usize,
    user_cache: OnceLock<Array2<f32>>,
    item_cache: OnceLock<Array2<f32>>,
}

impl BprTrainer {
    /// Set up a trainer.
    ///
    /// Item attributes are required for attribute embeddings and for
    /// attribute-weighted negative sampling; items that appear only in the
    /// attribute matrix extend the item ID space.
    pub fn new(
        config: BprConfig,
        data: Interactions,
        item_attributes: Option<BooleanMatrix>,
    ) -> Result<BprTrainer> {
        config.validate()?;
        let needs_attributes = config.item_side == ItemSideInfo::AttributeEmbedding
            || config.negatives == NegativeSampling::AttributeWeighted;
        if needs_attributes && item_attributes.is_none() {
            return Err(Error::InvalidConfig(
                "item attributes are required for attribute embeddings or weighted negatives"
                    .into(),
            ));
        }

        let n_interacted = data.n_items();
        let attr_rows = item_attributes.as_ref().map(|a| a.n_rows()).unwrap_or(0);
        let data = Arc::new(data.with_min_dims(0, attr_rows));
        let n_users = data.n_users();
        let n_items = data.n_items();
        let n_factors = config.factors.num_factors;
        debug!(
            "setting up BPR for {} users, {} items, {} factors",
            n_users, n_items, n_factors
        );

        let mut rng = make_rng(config.seed);
        let mut model = FactorModel::random(n_users, n_interacted, &config.factors, &mut rng)?;
        model.grow_items(n_items)?;

        let (mean, sd) = (config.factors.init_mean, config.factors.init_stddev);
        let implicit = match config.aggregation {
            Aggregation::SvdPlusPlus => Some(normal_matrix(n_items, n_factors, mean, sd, &mut rng)?),
            Aggregation::Plain => None,
        };
        let attribute = match (config.item_side, &item_attributes) {
            (ItemSideInfo::AttributeEmbedding, Some(attrs)) => {
                Some(normal_matrix(attrs.n_cols(), n_factors, mean, sd, &mut rng)?)
            }
            _ => None,
        };

        let freq = config.frequency_regularization;
        let user_counts: Vec<usize> = (0..n_users as u32).map(|u| data.user_count(u)).collect();
        let item_counts: Vec<usize> = (0..n_items as u32).map(|i| data.item_count(i)).collect();
        let reg_u = Regularizer::select(config.reg_u, freq, user_counts.iter().copied());
        let reg_i = Regularizer::select(config.reg_i, freq, item_counts.iter().copied());
        let reg_j = Regularizer::select(config.reg_j, freq, item_counts.iter().copied());
        let reg_y = Regularizer::implicit(config.reg_y, freq, item_counts.iter().copied());
        let reg_x = match &item_attributes {
            Some(attrs) => Regularizer::attribute_popularity(config.reg_x, freq, attrs.col_counts()),
            None => Regularizer::Constant(config.reg_x),
        };

        let uniform = UniformSampler::new(&data, &config.sampling)?;
        let sampler = match (config.negatives, &item_attributes) {
            (NegativeSampling::AttributeWeighted, Some(attrs)) => {
                debug!("learning per-user attribute weights for negative sampling");
                let mut linear = BprLinearTrainer::with_sampler(
                    config.linear.clone(),
                    Arc::clone(&data),
                    attrs.clone(),
                    uniform.clone(),
                    config.seed,
                )?;
                linear.train(config.linear.num_iter);
                Sampler::AttributeBiased(AttributeBiasedSampler::new(
                    uniform,
                    attrs.clone(),
                    linear.into_weights(),
                    &config.sampling,
                ))
            }
            _ => Sampler::Uniform(uniform),
        };

        let rate = LearnRate::new(config.learn_rate, &config.schedule);
        Ok(BprTrainer {
            config,
            data,
            item_attributes,
            model,
            implicit,
            attribute,
            reg_u,
            reg_i,
            reg_j,
            reg_x,
            reg_y,
            sampler,
            rate,
            rng,
            iterations: 0,
            user_cache: OnceLock::new(),
            item_cache: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &BprConfig {
        &self.config
    }

    pub fn data(&self) -> &Interactions {
        &self.data
    }

    pub fn model(&self) -> &FactorModel {
        &self.model
    }

    pub fn item_attributes(&self) -> Option<&BooleanMatrix> {
        self.item_attributes.as_ref()
    }

    /// Apply one gradient step for a (user, positive, negative) triple.
    ///
    /// Returns the pairwise loss before the step.
    pub fn step(&mut self, user: u32, pos: u32, neg: u32, lr: f32) -> f64 {
        self.invalidate();
        let data = Arc::clone(&self.data);
        let user_items = data.user_items(user);
        let norm = if user_items.is_empty() {
            1.0
        } else {
            (user_items.len() as f32).sqrt()
        };

        let u_vec = user_vector(&self.model, self.implicit.as_ref(), user_items, user);
        let attrs = self.item_attributes.as_ref();
        let i_vec = item_vector(&self.model, self.attribute.as_ref(), attrs, pos);
        let j_vec = item_vector(&self.model, self.attribute.as_ref(), attrs, neg);

        let x_uij = self.model.item_bias[pos as usize] - self.model.item_bias[neg as usize]
            + u_vec.dot(&(&i_vec - &j_vec));
        let x_uij = x_uij as f64;
        let sig = (1.0 / (1.0 + x_uij.exp())) as f32;

        let update_i = self.may_update(pos);
        let update_j = self.config.update_j && self.may_update(neg);

        let bias_reg = self.config.bias_reg;
        let (pi, ni) = (pos as usize, neg as usize);
        if update_i {
            let b = self.model.item_bias[pi];
            self.model.item_bias[pi] += lr * (sig - bias_reg * b);
        }
        if update_j {
            let b = self.model.item_bias[ni];
            self.model.item_bias[ni] += lr * (-sig - bias_reg * b);
        }

        let reg_u = self.reg_u.get(user);
        let reg_i = self.reg_i.get(pos);
        let reg_j = self.reg_j.get(neg);
        let u = user as usize;
        let pos_attrs: &[u32] = attrs.map(|a| a.row(pos)).unwrap_or(&[]);
        let neg_attrs: &[u32] = attrs.map(|a| a.row(neg)).unwrap_or(&[]);

        for f in 0..self.model.n_factors() {
            let (u_f, i_f, j_f) = (u_vec[f], i_vec[f], j_vec[f]);

            let p_f = self.model.user_factors[(u, f)];
            self.model.user_factors[(u, f)] += lr * ((i_f - j_f) * sig - reg_u * p_f);
            if let Some(y) = self.implicit.as_mut() {
                let grad = (i_f - j_f) * sig / norm;
                for k in user_items {
                    let y_kf = y[(*k as usize, f)];
                    y[(*k as usize, f)] += lr * (grad - self.reg_y.get(*k) * y_kf);
                }
            }

            if update_i {
                let q_f = self.model.item_factors[(pi, f)];
                self.model.item_factors[(pi, f)] += lr * (u_f * sig - reg_i * q_f);
                if let Some(x) = self.attribute.as_mut() {
                    update_attributes(x, &self.reg_x, pos_attrs, f, u_f * sig, lr);
                }
            }

            if update_j {
                let q_f = self.model.item_factors[(ni, f)];
                self.model.item_factors[(ni, f)] += lr * (-u_f * sig - reg_j * q_f);
                if let Some(x) = self.attribute.as_mut() {
                    update_attributes(x, &self.reg_x, neg_attrs, f, -u_f * sig, lr);
                }
            }
        }

        log_loss(x_uij)
    }

    fn may_update(&self, item: u32) -> bool {
        if !self.config.skip_unattributed_items {
            return true;
        }
        match &self.item_attributes {
            Some(attrs) => !attrs.row(item).is_empty(),
            None => true,
        }
    }

    /// Drop derived user and item vectors, forcing recomputation.
    fn invalidate(&mut self) {
        self.user_cache.take();
        self.item_cache.take();
    }

    fn user_vectors(&self) -> &Array2<f32> {
        self.user_cache.get_or_init(|| {
            let mut out = Array2::zeros(self.model.user_factors.dim());
            for u in 0..self.model.n_users() as u32 {
                let v = user_vector(
                    &self.model,
                    self.implicit.as_ref(),
                    self.data.user_items(u),
                    u,
                );
                out.row_mut(u as usize).assign(&v);
            }
            out
        })
    }

    fn item_vectors(&self) -> &Array2<f32> {
        self.item_cache.get_or_init(|| {
            let mut out = Array2::zeros(self.model.item_factors.dim());
            for i in 0..self.model.n_items() as u32 {
                let v = item_vector(
                    &self.model,
                    self.attribute.as_ref(),
                    self.item_attributes.as_ref(),
                    i,
                );
                out.row_mut(i as usize).assign(&v);
            }
            out
        })
    }

    fn knows_user(&self, user: u32) -> bool {
        self.model.has_user(user) && self.data.user_count(user) > 0
    }

    fn knows_item(&self, item: u32) -> bool {
        if !self.model.has_item(item) {
            return false;
        }
        if self.data.item_count(item) > 0 {
            return true;
        }
        match (&self.attribute, &self.item_attributes) {
            (Some(_), Some(attrs)) => !attrs.row(item).is_empty(),
            _ => false,
        }
    }

    pub fn to_archive(&self) -> ModelArchive {
        let mut ar = self.model.to_archive(ARCHIVE_KIND);
        if let Some(y) = &self.implicit {
            ar.push_matrix("implicit_embeddings", y);
        }
        if let Some(x) = &self.attribute {
            ar.push_matrix("attribute_embeddings", x);
        }
        ar
    }

    /// Restore learned parameters from an archive produced by a trainer
    /// with the same configuration and data.
    pub fn load_archive(&mut self, ar: &ModelArchive) -> Result<()> {
        ar.expect_kind(ARCHIVE_KIND)?;
        let model = FactorModel::from_archive(ar)?;
        check_dims("user factor rows", self.model.n_users(), model.n_users())?;
        check_dims("item factor rows", self.model.n_items(), model.n_items())?;
        check_dims("factor columns", self.model.n_factors(), model.n_factors())?;
        let implicit = load_optional(ar, "implicit_embeddings", self.implicit.as_ref())?;
        let attribute = load_optional(ar, "attribute_embeddings", self.attribute.as_ref())?;

        self.model = model;
        self.implicit = implicit;
        self.attribute = attribute;
        self.invalidate();
        Ok(())
    }
}

impl Trainer for BprTrainer {
    fn iterate(&mut self) -> f64 {
        let n = self.data.n_pairs();
        let lr = self.rate.current();
        let data = Arc::clone(&self.data);
        let mut loss = 0.0;
        for _ in 0..n {
            let (u, i, j) = self.sampler.sample_triple(&data, &mut self.rng);
            loss += self.step(u, i, j, lr);
        }
        let loss = if n > 0 { loss / n as f64 } else { 0.0 };
        self.rate.end_pass(loss);
        self.iterations += 1;
        loss
    }

    fn iterations(&self) -> usize {
        self.iterations
    }

    fn samples_per_iteration(&self) -> usize {
        self.data.n_pairs()
    }

    fn learn_rate(&self) -> f32 {
        self.rate.current()
    }

    fn model_bytes(&self) -> usize {
        self.model.memory_size()
            + self.implicit.as_ref().map(|y| y.len() * 4).unwrap_or(0)
            + self.attribute.as_ref().map(|x| x.len() * 4).unwrap_or(0)
    }
}

impl Predictor for BprTrainer {
    fn score(&self, user: u32, item: u32) -> f32 {
        if !self.knows_user(user) || !self.knows_item(item) {
            return UNKNOWN_SCORE;
        }
        let uv = self.user_vectors().row(user as usize);
        let iv = self.item_vectors().row(item as usize);
        self.model.item_bias[item as usize] + uv.dot(&iv)
    }
}

impl FactorSource for BprTrainer {
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
        if self.knows_user(user) {
            Some(self.user_vectors().row(user as usize).to_owned())
        } else {
            None
        }
    }

    fn item_vector(&self, item: u32) -> Option<Array1<f32>> {
        if self.knows_item(item) {
            Some(self.item_vectors().row(item as usize).to_owned())
        } else {
            None
        }
    }

    fn user_observed(&self, user: u32) -> bool {
        self.knows_user(user)
    }

    fn item_observed(&self, item: u32) -> bool {
        self.model.has_item(item) && self.data.item_count(item) > 0
    }

    fn item_bias(&self, item: u32) -> f32 {
        self.model.item_bias.get(item as usize).copied().unwrap_or(0.0)
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
            let norm = (items.len() as f32).sqrt();
            for k in items {
                v.scaled_add(1.0 / norm, &y.row(*k as usize));
            }
        }
    }
    v
}

fn item_vector(
    model: &FactorModel,
    attribute: Option<&Array2<f32>>,
    attrs: Option<&BooleanMatrix>,
    item: u32,
) -> Array1<f32> {
    let mut v = model.item_vector(item).to_owned();
    if let (Some(x), Some(attrs)) = (attribute, attrs) {
        let row = attrs.row(item);
        if !row.is_empty() {
            let scale = 1.0 / row.len() as f32;
            for a in row {
                v.scaled_add(scale, &x.row(*a as usize));
            }
        }
    }
    v
}

fn update_attributes(
    x: &mut Array2<f32>,
    reg: &Regularizer,
    attrs: &[u32],
    f: usize,
    grad: f32,
    lr: f32,
) {
    if attrs.is_empty() {
        return;
    }
    let grad = grad / attrs.len() as f32;
    for a in attrs {
        let x_af = x[(*a as usize, f)];
        x[(*a as usize, f)] += lr * (grad - reg.get(*a) * x_af);
    }
}

fn check_dims(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::shape(what, expected, actual))
    }
}

fn load_optional(
    ar: &ModelArchive,
    name: &str,
    current: Option<&Array2<f32>>,
) -> Result<Option<Array2<f32>>> {
    match current {
        Some(cur) => {
            let m = ar.matrix(name)?;
            if m.dim() != cur.dim() {
                return Err(Error::shape(name, cur.len(), m.len()));
            }
            Ok(Some(m))
        }
        None => Ok(None),
    }
}
