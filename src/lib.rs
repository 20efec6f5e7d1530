// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Latent-factor recommender training with side information.
//!
//! Trainers learn user and item factors from implicit feedback (BPR) or
//! ratings, optionally augmented with attribute and relation terms.  An
//! attribute mapper projects attribute sets into the factor space so that
//! users and items without interactions can still be scored.

pub mod config;
pub mod data;
pub mod errors;
pub mod mapping;
pub mod model;
pub mod parallel;
pub mod progress;
pub mod sampling;
pub mod scoring;
pub mod sparse;
pub mod train;

#[cfg(feature = "python")]
mod python;

pub use errors::{Error, Result};
pub use mapping::{AttributeMapper, MapperMode};
pub use model::FactorModel;
pub use scoring::{FactorSource, MappedScorer, Predictor, UNKNOWN_SCORE};
pub use train::{BprTrainer, RatingTrainer, Trainer};

/// Entry point for the Python extension module.
#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _latent(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    pyo3_log::init();
    python::register(m)
}
