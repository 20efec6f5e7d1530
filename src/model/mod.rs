// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Latent-factor model state.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;

use crate::config::FactorConfig;
use crate::errors::{Error, Result};

mod init;
mod persist;

pub use init::{make_rng, normal_matrix};
pub use persist::{ModelArchive, NamedArray};

/// Dense factor and bias arrays indexed by user and item ID.
///
/// Rows are only ever appended, so IDs stay stable as the ID space grows.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorModel {
    pub user_factors: Array2<f32>,
    pub item_factors: Array2<f32>,
    pub user_bias: Array1<f32>,
    pub item_bias: Array1<f32>,
    pub global_bias: f32,
}

impl FactorModel {
    /// Create an all-zero model.
    pub fn zeros(n_users: usize, n_items: usize, n_factors: usize) -> FactorModel {
        FactorModel {
            user_factors: Array2::zeros((n_users, n_factors)),
            item_factors: Array2::zeros((n_items, n_factors)),
            user_bias: Array1::zeros(n_users),
            item_bias: Array1::zeros(n_items),
            global_bias: 0.0,
        }
    }

    /// Create a model with normally-initialized factors and zero biases.
    pub fn random<R: Rng + ?Sized>(
        n_users: usize,
        n_items: usize,
        config: &FactorConfig,
        rng: &mut R,
    ) -> Result<FactorModel> {
        let (mean, sd) = (config.init_mean, config.init_stddev);
        Ok(FactorModel {
            user_factors: normal_matrix(n_users, config.num_factors, mean, sd, rng)?,
            item_factors: normal_matrix(n_items, config.num_factors, mean, sd, rng)?,
            user_bias: Array1::zeros(n_users),
            item_bias: Array1::zeros(n_items),
            global_bias: 0.0,
        })
    }

    /// Assemble a model from parts, checking that paired shapes agree.
    pub fn from_parts(
        user_factors: Array2<f32>,
        item_factors: Array2<f32>,
        user_bias: Array1<f32>,
        item_bias: Array1<f32>,
        global_bias: f32,
    ) -> Result<FactorModel> {
        if user_factors.ncols() != item_factors.ncols() {
            return Err(Error::shape(
                "item factor columns",
                user_factors.ncols(),
                item_factors.ncols(),
            ));
        }
        if user_bias.len() != user_factors.nrows() {
            return Err(Error::shape("user bias", user_factors.nrows(), user_bias.len()));
        }
        if item_bias.len() != item_factors.nrows() {
            return Err(Error::shape("item bias", item_factors.nrows(), item_bias.len()));
        }
        Ok(FactorModel {
            user_factors,
            item_factors,
            user_bias,
            item_bias,
            global_bias,
        })
    }

    pub fn n_users(&self) -> usize {
        self.user_factors.nrows()
    }

    pub fn n_items(&self) -> usize {
        self.item_factors.nrows()
    }

    pub fn n_factors(&self) -> usize {
        self.user_factors.ncols()
    }

    pub fn has_user(&self, user: u32) -> bool {
        (user as usize) < self.n_users()
    }

    pub fn has_item(&self, item: u32) -> bool {
        (item as usize) < self.n_items()
    }

    /// Grow to at least `n_users` users, appending zero rows.
    pub fn grow_users(&mut self, n_users: usize) -> Result<()> {
        let cur = self.n_users();
        if n_users > cur {
            let extra = n_users - cur;
            self.user_factors
                .append(Axis(0), Array2::zeros((extra, self.n_factors())).view())?;
            self.user_bias.append(Axis(0), Array1::zeros(extra).view())?;
        }
        Ok(())
    }

    /// Grow to at least `n_items` items, appending zero rows.
    pub fn grow_items(&mut self, n_items: usize) -> Result<()> {
        let cur = self.n_items();
        if n_items > cur {
            let extra = n_items - cur;
            self.item_factors
                .append(Axis(0), Array2::zeros((extra, self.n_factors())).view())?;
            self.item_bias.append(Axis(0), Array1::zeros(extra).view())?;
        }
        Ok(())
    }

    pub fn user_vector(&self, user: u32) -> ArrayView1<'_, f32> {
        self.user_factors.row(user as usize)
    }

    pub fn item_vector(&self, item: u32) -> ArrayView1<'_, f32> {
        self.item_factors.row(item as usize)
    }

    /// Dot product of a user's and an item's factors.
    pub fn dot(&self, user: u32, item: u32) -> f32 {
        self.user_vector(user).dot(&self.item_vector(item))
    }

    /// Global, user and item biases plus the factor dot product.
    pub fn biased_score(&self, user: u32, item: u32) -> f32 {
        self.global_bias
            + self.user_bias[user as usize]
            + self.item_bias[item as usize]
            + self.dot(user, item)
    }

    /// Size of the arrays in bytes.
    pub fn memory_size(&self) -> usize {
        (self.user_factors.len()
            + self.item_factors.len()
            + self.user_bias.len()
            + self.item_bias.len()
            + 1)
            * std::mem::size_of::<f32>()
    }

    pub fn to_archive(&self, kind: &str) -> ModelArchive {
        let mut ar = ModelArchive::new(kind);
        ar.push_matrix("user_factors", &self.user_factors);
        ar.push_matrix("item_factors", &self.item_factors);
        ar.push_vector("user_bias", &self.user_bias);
        ar.push_vector("item_bias", &self.item_bias);
        ar.set_scalar("global_bias", self.global_bias);
        ar
    }

    pub fn from_archive(ar: &ModelArchive) -> Result<FactorModel> {
        FactorModel::from_parts(
            ar.matrix("user_factors")?,
            ar.matrix("item_factors")?,
            ar.vector("user_bias")?,
            ar.vector("item_bias")?,
            ar.scalar("global_bias")?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_grow_keeps_rows() {
        let mut rng = make_rng(11);
        let mut model =
            FactorModel::random(3, 4, &FactorConfig::default(), &mut rng).expect("valid init");
        model.user_bias[2] = 0.5;
        let before = model.clone();

        model.grow_users(5).expect("grow users");
        model.grow_items(4).expect("grow items");
        assert_eq!(model.n_users(), 5);
        assert_eq!(model.n_items(), 4);
        for u in 0..3 {
            assert_eq!(model.user_vector(u), before.user_vector(u));
        }
        assert!(model.user_vector(3).iter().all(|v| *v == 0.0));
        assert!(model.user_vector(4).iter().all(|v| *v == 0.0));
        assert_eq!(model.user_bias[2], 0.5);
        assert_eq!(model.user_bias[4], 0.0);
        assert_eq!(model.item_factors, before.item_factors);
    }

    #[test]
    fn test_biased_score() {
        let mut model = FactorModel::zeros(1, 1, 2);
        model.user_factors = array![[1.0, 2.0]];
        model.item_factors = array![[3.0, -1.0]];
        model.user_bias[0] = 0.25;
        model.item_bias[0] = 0.5;
        model.global_bias = 3.0;
        assert_eq!(model.dot(0, 0), 1.0);
        assert_eq!(model.biased_score(0, 0), 4.75);
    }

    #[test]
    fn test_from_parts_checks() {
        let res = FactorModel::from_parts(
            Array2::zeros((2, 3)),
            Array2::zeros((4, 2)),
            Array1::zeros(2),
            Array1::zeros(4),
            0.0,
        );
        assert!(matches!(res, Err(Error::ShapeMismatch { .. })));

        let res = FactorModel::from_parts(
            Array2::zeros((2, 3)),
            Array2::zeros((4, 3)),
            Array1::zeros(2),
            Array1::zeros(3),
            0.0,
        );
        assert!(matches!(res, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_archive_round_trip() {
        let mut rng = make_rng(3);
        let mut model =
            FactorModel::random(2, 3, &FactorConfig::default(), &mut rng).expect("valid init");
        model.global_bias = 3.5;
        let json = model.to_archive("factors").to_json().expect("serializable");
        let ar = ModelArchive::from_json(&json).expect("valid archive");
        let back = FactorModel::from_archive(&ar).expect("valid model");
        assert_eq!(back, model);
    }
}
