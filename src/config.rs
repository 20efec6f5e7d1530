// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Training configuration.
//!
//! Every configuration deserializes from JSON with defaults for missing fields.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Common behavior for configuration structures.
pub trait Config: DeserializeOwned + Serialize {
    /// Check that the configuration values are usable.
    fn validate(&self) -> Result<()>;

    /// Parse and validate a configuration from a JSON string.
    fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn check_finite(name: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("{} must be finite, got {}", name, value)))
    }
}

fn check_nonneg(name: &str, value: f32) -> Result<()> {
    check_finite(name, value)?;
    if value < 0.0 {
        Err(Error::InvalidConfig(format!("{} must be non-negative, got {}", name, value)))
    } else {
        Ok(())
    }
}

fn check_positive(name: &str, value: f32) -> Result<()> {
    check_finite(name, value)?;
    if value <= 0.0 {
        Err(Error::InvalidConfig(format!("{} must be positive, got {}", name, value)))
    } else {
        Ok(())
    }
}

/// How a user's vector is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// The user factor alone.
    #[default]
    Plain,
    /// User factor plus the normalized sum of implicit item embeddings.
    SvdPlusPlus,
}

/// Item side information used by the pairwise engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSideInfo {
    #[default]
    None,
    /// Item factor plus the mean of its attribute embeddings.
    AttributeEmbedding,
}

/// Negative item selection for the pairwise engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeSampling {
    #[default]
    Uniform,
    /// Prefer items whose mean attribute weight differs from the positive item's.
    AttributeWeighted,
}

/// Loss for the pointwise engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointwiseLoss {
    #[default]
    Squared,
    /// Squash scores into the rating range with a logistic function.
    Logistic,
}

/// Latent factor dimensions and initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorConfig {
    pub num_factors: usize,
    pub init_mean: f32,
    pub init_stddev: f32,
}

impl Default for FactorConfig {
    fn default() -> Self {
        FactorConfig {
            num_factors: 10,
            init_mean: 0.0,
            init_stddev: 0.1,
        }
    }
}

impl Config for FactorConfig {
    fn validate(&self) -> Result<()> {
        check_finite("init_mean", self.init_mean)?;
        check_nonneg("init_stddev", self.init_stddev)
    }
}

/// Negative sampling options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Memory budget (bytes) for precomputed per-user sampling tables.
    pub fast_sampling_budget: usize,
    /// Minimum mean-attribute-weight difference for attribute-weighted negatives.
    pub biased_margin: f32,
    /// Draws before the attribute-weighted sampler falls back to uniform sampling.
    pub biased_max_draws: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            fast_sampling_budget: 1024 * 1024 * 1024,
            biased_margin: 2.5,
            biased_max_draws: 100,
        }
    }
}

impl Config for SamplingConfig {
    fn validate(&self) -> Result<()> {
        check_nonneg("biased_margin", self.biased_margin)
    }
}

/// Learning rate schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Multiplier applied to the learning rate after each pass.
    pub decay: f32,
    /// Adapt the learning rate to the change in training loss.
    pub bold_driver: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            decay: 1.0,
            bold_driver: false,
        }
    }
}

impl Config for ScheduleConfig {
    fn validate(&self) -> Result<()> {
        check_positive("decay", self.decay)
    }
}

/// Per-user item attribute weights trained with BPR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BprLinearConfig {
    pub learn_rate: f32,
    pub regularization: f32,
    pub num_iter: usize,
}

impl Default for BprLinearConfig {
    fn default() -> Self {
        BprLinearConfig {
            learn_rate: 0.05,
            regularization: 0.015,
            num_iter: 10,
        }
    }
}

impl Config for BprLinearConfig {
    fn validate(&self) -> Result<()> {
        check_positive("learn_rate", self.learn_rate)?;
        check_nonneg("regularization", self.regularization)
    }
}

/// Pairwise (BPR) training options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BprConfig {
    pub factors: FactorConfig,
    pub sampling: SamplingConfig,
    pub schedule: ScheduleConfig,
    pub learn_rate: f32,
    pub bias_reg: f32,
    pub reg_u: f32,
    pub reg_i: f32,
    pub reg_j: f32,
    /// Regularization of attribute embeddings.
    pub reg_x: f32,
    /// Regularization of implicit item embeddings.
    pub reg_y: f32,
    pub frequency_regularization: bool,
    pub update_j: bool,
    /// Leave items without attributes untouched when training attribute embeddings.
    pub skip_unattributed_items: bool,
    pub aggregation: Aggregation,
    pub item_side: ItemSideInfo,
    pub negatives: NegativeSampling,
    pub linear: BprLinearConfig,
    pub num_iter: usize,
    pub seed: u64,
}

impl Default for BprConfig {
    fn default() -> Self {
        BprConfig {
            factors: FactorConfig::default(),
            sampling: SamplingConfig::default(),
            schedule: ScheduleConfig::default(),
            learn_rate: 0.05,
            bias_reg: 1.0,
            reg_u: 0.0025,
            reg_i: 0.0025,
            reg_j: 0.00025,
            reg_x: 20.0,
            reg_y: 2.0,
            frequency_regularization: false,
            update_j: true,
            skip_unattributed_items: false,
            aggregation: Aggregation::Plain,
            item_side: ItemSideInfo::None,
            negatives: NegativeSampling::Uniform,
            linear: BprLinearConfig::default(),
            num_iter: 30,
            seed: 42,
        }
    }
}

impl Config for BprConfig {
    fn validate(&self) -> Result<()> {
        self.factors.validate()?;
        self.sampling.validate()?;
        self.schedule.validate()?;
        self.linear.validate()?;
        check_positive("learn_rate", self.learn_rate)?;
        for (name, v) in [
            ("bias_reg", self.bias_reg),
            ("reg_u", self.reg_u),
            ("reg_i", self.reg_i),
            ("reg_j", self.reg_j),
            ("reg_x", self.reg_x),
            ("reg_y", self.reg_y),
        ] {
            check_nonneg(name, v)?;
        }
        Ok(())
    }
}

/// Pointwise (rating prediction) training options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub factors: FactorConfig,
    pub schedule: ScheduleConfig,
    pub learn_rate: f32,
    /// Extra multiplier on the learning rate for bias and attribute-mean terms.
    pub bias_learn_rate: f32,
    pub bias_reg: f32,
    pub regularization: f32,
    pub frequency_regularization: bool,
    pub aggregation: Aggregation,
    pub loss: PointwiseLoss,
    pub num_iter: usize,
    pub seed: u64,
    /// Rating bounds; taken from the data when absent.
    pub min_rating: Option<f32>,
    pub max_rating: Option<f32>,
}

impl Default for RatingConfig {
    fn default() -> Self {
        RatingConfig {
            factors: FactorConfig::default(),
            schedule: ScheduleConfig::default(),
            learn_rate: 0.01,
            bias_learn_rate: 1.0,
            bias_reg: 0.01,
            regularization: 0.015,
            frequency_regularization: false,
            aggregation: Aggregation::Plain,
            loss: PointwiseLoss::Squared,
            num_iter: 30,
            seed: 42,
            min_rating: None,
            max_rating: None,
        }
    }
}

impl Config for RatingConfig {
    fn validate(&self) -> Result<()> {
        self.factors.validate()?;
        self.schedule.validate()?;
        check_positive("learn_rate", self.learn_rate)?;
        check_positive("bias_learn_rate", self.bias_learn_rate)?;
        check_nonneg("bias_reg", self.bias_reg)?;
        check_nonneg("regularization", self.regularization)?;
        if let (Some(lo), Some(hi)) = (self.min_rating, self.max_rating) {
            if lo > hi {
                return Err(Error::InvalidConfig(format!(
                    "min_rating {} exceeds max_rating {}",
                    lo, hi
                )));
            }
        }
        Ok(())
    }
}

/// Attribute-to-factor mapping options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub num_restarts: usize,
    /// Each restart takes `num_iter × max_id` steps.
    pub num_iter: usize,
    pub learn_rate: f32,
    pub regularization: f32,
    pub init_mean: f32,
    pub init_stddev: f32,
    /// Steps between fit reports within a restart.
    pub report_every: usize,
    pub seed: u64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            num_restarts: 5,
            num_iter: 10,
            learn_rate: 0.01,
            regularization: 0.1,
            init_mean: 0.0,
            init_stddev: 0.1,
            report_every: 5000,
            seed: 42,
        }
    }
}

impl Config for MapperConfig {
    fn validate(&self) -> Result<()> {
        if self.num_restarts == 0 {
            return Err(Error::InvalidConfig("num_restarts must be at least 1".into()));
        }
        check_positive("learn_rate", self.learn_rate)?;
        check_nonneg("regularization", self.regularization)?;
        check_finite("init_mean", self.init_mean)?;
        check_nonneg("init_stddev", self.init_stddev)
    }
}
