// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Python bindings for the trainers.

use arrow::{
    array::{make_array, ArrayData, ArrayRef},
    pyarrow::PyArrowType,
};
use numpy::{PyArray1, PyArray2};
use pyo3::prelude::*;

use crate::config::{BprConfig, Config, RatingConfig};
use crate::data::{id_column, AttributeSpaces, BooleanMatrix, Interactions};
use crate::progress::TrainingStats;
use crate::scoring::{score_pairs, Predictor};
use crate::train::{BprTrainer, RatingTrainer, SideInfo, Trainer};

/// Arrow row and column index arrays of a boolean matrix.
#[derive(FromPyObject)]
struct MatrixInput {
    rows: PyArrowType<ArrayData>,
    cols: PyArrowType<ArrayData>,
    n_rows: usize,
    n_cols: usize,
}

impl MatrixInput {
    fn into_matrix(self) -> PyResult<BooleanMatrix> {
        let rows = make_array(self.rows.0);
        let cols = make_array(self.cols.0);
        Ok(BooleanMatrix::from_arrow(&*rows, &*cols, self.n_rows, self.n_cols)?)
    }
}

fn interactions(
    users: PyArrowType<ArrayData>,
    items: PyArrowType<ArrayData>,
    ratings: Option<PyArrowType<ArrayData>>,
) -> PyResult<Interactions> {
    let users: ArrayRef = make_array(users.0);
    let items: ArrayRef = make_array(items.0);
    let ratings: Option<ArrayRef> = ratings.map(|r| make_array(r.0));
    Ok(Interactions::from_arrow(&*users, &*items, ratings.as_deref())?)
}

fn ids(name: &str, array: PyArrowType<ArrayData>) -> PyResult<Vec<u32>> {
    let array = make_array(array.0);
    Ok(id_column(name, &*array)?)
}

fn stats_tuple(stats: TrainingStats) -> (usize, Option<f64>, f64) {
    (stats.iterations, stats.last_loss, stats.elapsed.as_secs_f64())
}

/// Pairwise ranking trainer.
#[pyclass(name = "BprTrainer")]
pub struct PyBprTrainer {
    trainer: BprTrainer,
}

#[pymethods]
impl PyBprTrainer {
    #[new]
    #[pyo3(signature = (config, users, items, item_attributes=None))]
    fn new(
        config: &str,
        users: PyArrowType<ArrayData>,
        items: PyArrowType<ArrayData>,
        item_attributes: Option<MatrixInput>,
    ) -> PyResult<Self> {
        let config = BprConfig::from_json(config)?;
        let data = interactions(users, items, None)?;
        let attrs = item_attributes.map(|m| m.into_matrix()).transpose()?;
        Ok(PyBprTrainer {
            trainer: BprTrainer::new(config, data, attrs)?,
        })
    }

    /// Run training passes without holding the GIL.
    fn train(&mut self, py: Python<'_>, n: usize) -> (usize, Option<f64>, f64) {
        let trainer = &mut self.trainer;
        stats_tuple(py.allow_threads(|| trainer.train(n)))
    }

    fn score<'py>(
        &self,
        py: Python<'py>,
        users: PyArrowType<ArrayData>,
        items: PyArrowType<ArrayData>,
    ) -> PyResult<Bound<'py, PyArray1<f32>>> {
        let users = ids("users", users)?;
        let items = ids("items", items)?;
        let trainer = &self.trainer;
        let scores = py.allow_threads(|| score_pairs(trainer, &users, &items))?;
        Ok(PyArray1::from_vec(py, scores))
    }

    fn user_embeddings<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f32>> {
        PyArray2::from_owned_array(py, self.trainer.model().user_factors.clone())
    }

    fn item_embeddings<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f32>> {
        PyArray2::from_owned_array(py, self.trainer.model().item_factors.clone())
    }

    fn to_json(&self) -> PyResult<String> {
        Ok(self.trainer.to_archive().to_json()?)
    }
}

/// Pointwise rating trainer.
#[pyclass(name = "RatingTrainer")]
pub struct PyRatingTrainer {
    trainer: RatingTrainer,
}

#[pymethods]
impl PyRatingTrainer {
    #[new]
    #[pyo3(signature = (config, users, items, ratings, user_attributes=None, item_attributes=None, relations=None))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        config: &str,
        users: PyArrowType<ArrayData>,
        items: PyArrowType<ArrayData>,
        ratings: PyArrowType<ArrayData>,
        user_attributes: Option<MatrixInput>,
        item_attributes: Option<MatrixInput>,
        relations: Option<MatrixInput>,
    ) -> PyResult<Self> {
        let config = RatingConfig::from_json(config)?;
        let data = interactions(users, items, Some(ratings))?;
        let mut side = SideInfo::default();
        if let Some(m) = user_attributes {
            side = side.with_user_attributes(AttributeSpaces::new(m.into_matrix()?));
        }
        if let Some(m) = item_attributes {
            side = side.with_item_attributes(AttributeSpaces::new(m.into_matrix()?));
        }
        if let Some(m) = relations {
            side = side.with_relations(m.into_matrix()?);
        }
        Ok(PyRatingTrainer {
            trainer: RatingTrainer::new(config, data, side)?,
        })
    }

    fn train(&mut self, py: Python<'_>, n: usize) -> (usize, Option<f64>, f64) {
        let trainer = &mut self.trainer;
        stats_tuple(py.allow_threads(|| trainer.train(n)))
    }

    /// Predictions clamped to the rating range.
    fn predict<'py>(
        &self,
        py: Python<'py>,
        users: PyArrowType<ArrayData>,
        items: PyArrowType<ArrayData>,
    ) -> PyResult<Bound<'py, PyArray1<f32>>> {
        let users = ids("users", users)?;
        let items = ids("items", items)?;
        let trainer = &self.trainer;
        let scores = py.allow_threads(|| score_pairs(trainer, &users, &items))?;
        Ok(PyArray1::from_vec(py, scores))
    }

    fn raw_score(&self, user: u32, item: u32) -> f32 {
        self.trainer.score(user, item)
    }

    fn to_json(&self) -> PyResult<String> {
        Ok(self.trainer.to_archive().to_json()?)
    }
}

#[pyfunction]
fn init_pool(n_threads: usize) -> PyResult<()> {
    Ok(crate::parallel::init_pool(n_threads)?)
}

#[pyfunction]
fn thread_count() -> usize {
    crate::parallel::thread_count()
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBprTrainer>()?;
    m.add_class::<PyRatingTrainer>()?;
    m.add_function(wrap_pyfunction!(init_pool, m)?)?;
    m.add_function(wrap_pyfunction!(thread_count, m)?)?;
    Ok(())
}
