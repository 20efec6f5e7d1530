// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Linear mapping from sparse attribute sets into a learned factor space.
//!
//! The mapper is a `(n_attributes + 1) × F` weight matrix.  An entity maps to
//! the last (bias) row plus the rows of all its attributes, summed without
//! normalization.  Attribute spaces are stacked: the columns of each
//! additional space follow those of the previous one.
//!
//! Fitting runs several restarts from fresh normal initializations and keeps,
//! for each factor column separately, the column from the restart that fit it
//! best.

use std::sync::RwLock;

use log::*;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rustc_hash::FxHashMap;

use crate::config::{Config, MapperConfig};
use crate::data::AttributeSpaces;
use crate::errors::{Error, Result};
use crate::model::{make_rng, normal_matrix, ModelArchive};
use crate::progress::ProgressHandle;

mod fit;

pub use fit::MappingFit;
use fit::{column_fit, pick_columns, splice_columns};

const ARCHIVE_KIND: &str = "attribute-mapper";

/// Whether mapped vectors may be memoized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperMode {
    /// Weights are changing; every call recomputes.
    Training,
    /// Weights are frozen; results are cached per entity.
    Serving,
}

/// Attribute-to-factor mapper.
pub struct AttributeMapper {
    config: MapperConfig,
    attributes: AttributeSpaces,
    offsets: Vec<usize>,
    weights: Array2<f32>,
    mode: MapperMode,
    cache: RwLock<FxHashMap<u32, Array1<f32>>>,
    report: MappingFit,
}

impl AttributeMapper {
    /// Create an untrained mapper with zero weights.
    pub fn new(config: MapperConfig, attributes: AttributeSpaces, n_factors: usize) -> Result<AttributeMapper> {
        config.validate()?;
        let mut offsets = Vec::with_capacity(attributes.len());
        let mut n_attrs = 0;
        for space in attributes.spaces() {
            offsets.push(n_attrs);
            n_attrs += space.n_cols();
        }
        Ok(AttributeMapper {
            config,
            attributes,
            offsets,
            weights: Array2::zeros((n_attrs + 1, n_factors)),
            mode: MapperMode::Training,
            cache: RwLock::new(FxHashMap::default()),
            report: MappingFit::default(),
        })
    }

    /// Fit a mapper to target factor rows.
    ///
    /// `targets` has one row per entity ID; `observed[e]` says whether entity
    /// `e` has interactions, and so whether its target row is meaningful.
    pub fn fit(
        config: MapperConfig,
        attributes: AttributeSpaces,
        targets: ArrayView2<'_, f32>,
        observed: &[bool],
    ) -> Result<AttributeMapper> {
        let mut mapper = AttributeMapper::new(config, attributes, targets.ncols())?;
        mapper.train(targets, observed)?;
        Ok(mapper)
    }

    pub fn n_attributes(&self) -> usize {
        self.weights.nrows() - 1
    }

    pub fn n_factors(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    pub fn bias_row(&self) -> ArrayView1<'_, f32> {
        self.weights.row(self.n_attributes())
    }

    pub fn attributes(&self) -> &AttributeSpaces {
        &self.attributes
    }

    /// Column offset of an attribute space in the weight matrix.
    pub fn space_offset(&self, space: usize) -> Option<usize> {
        self.offsets.get(space).copied()
    }

    pub fn mode(&self) -> MapperMode {
        self.mode
    }

    /// Switch modes, dropping memoized vectors.
    pub fn set_mode(&mut self, mode: MapperMode) {
        self.clear_cache();
        self.mode = mode;
    }

    pub fn report(&self) -> &MappingFit {
        &self.report
    }

    /// Test whether an entity lies within the ID range of any attribute space.
    pub fn covers(&self, entity: u32) -> bool {
        self.attributes.spaces().any(|s| s.has_row(entity))
    }

    fn clear_cache(&self) {
        match self.cache.write() {
            Ok(mut c) => c.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    /// Weight-matrix rows of an entity's attributes, across all spaces.
    fn entity_rows(&self, entity: u32) -> Vec<usize> {
        self.attributes
            .spaces()
            .zip(self.offsets.iter())
            .flat_map(|(space, off)| space.row(entity).iter().map(move |a| off + *a as usize))
            .collect()
    }

    fn map_rows(&self, rows: &[usize]) -> Array1<f32> {
        let mut v = self.bias_row().to_owned();
        for r in rows {
            v += &self.weights.row(*r);
        }
        v
    }

    /// Map an entity's attributes to a factor vector.
    ///
    /// An entity with no attributes maps to the bias row.
    pub fn map(&self, entity: u32) -> Array1<f32> {
        if self.mode == MapperMode::Training {
            return self.map_rows(&self.entity_rows(entity));
        }

        if let Ok(cache) = self.cache.read() {
            if let Some(v) = cache.get(&entity) {
                return v.clone();
            }
        }
        let v = self.map_rows(&self.entity_rows(entity));
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(entity, v.clone());
        }
        v
    }

    /// Map an explicit attribute list, given as weight-matrix row indices.
    pub fn map_attributes(&self, rows: &[u32]) -> Result<Array1<f32>> {
        let n = self.n_attributes();
        let rows: Vec<usize> = rows.iter().map(|r| *r as usize).collect();
        if let Some(bad) = rows.iter().find(|r| **r >= n) {
            return Err(Error::shape("attribute index", n, *bad));
        }
        Ok(self.map_rows(&rows))
    }

    /// Rerun the restart-and-pick fit against new targets.
    pub fn train(&mut self, targets: ArrayView2<'_, f32>, observed: &[bool]) -> Result<()> {
        if targets.ncols() != self.n_factors() {
            return Err(Error::shape("mapping target columns", self.n_factors(), targets.ncols()));
        }
        if observed.len() != targets.nrows() {
            return Err(Error::shape("observed flags", targets.nrows(), observed.len()));
        }
        self.set_mode(MapperMode::Training);

        let examples: Vec<u32> = (0..targets.nrows() as u32)
            .filter(|e| observed[*e as usize] && !self.entity_rows(*e).is_empty())
            .collect();
        if examples.is_empty() {
            return Err(Error::NoMappingExamples);
        }
        let example_rows: Vec<Vec<usize>> = examples.iter().map(|e| self.entity_rows(*e)).collect();
        let example_targets = targets.select(Axis(0), &examples.iter().map(|e| *e as usize).collect::<Vec<_>>());

        let max_id = targets.nrows().saturating_sub(1).max(1);
        let n_steps = self.config.num_iter * max_id;
        debug!(
            "fitting attribute mapper: {} examples, {} attributes, {} factors, {} restarts of {} steps",
            examples.len(),
            self.n_attributes(),
            self.n_factors(),
            self.config.num_restarts,
            n_steps
        );

        let mut rng = make_rng(self.config.seed);
        let mut candidates = Vec::with_capacity(self.config.num_restarts);
        let mut fits = Vec::with_capacity(self.config.num_restarts);
        let pb = ProgressHandle::new("mapper restarts", Some(self.config.num_restarts));

        for h in 0..self.config.num_restarts {
            self.weights = normal_matrix(
                self.weights.nrows(),
                self.weights.ncols(),
                self.config.init_mean,
                self.config.init_stddev,
                &mut rng,
            )?;
            debug!("mapper restart {}", h);
            for step in 0..n_steps {
                let k = rng.random_range(0..examples.len());
                self.step(&example_rows[k], example_targets.row(k));
                let report = self.config.report_every;
                if report > 0 && (step + 1) % report == 0 {
                    let fit = self.fit_columns(&example_rows, example_targets.view());
                    trace!("restart {} step {}: fit {:?}", h, step + 1, fit);
                }
            }
            let fit = self.fit_columns(&example_rows, example_targets.view());
            debug!("restart {} final fit {:?}", h, fit);
            fits.push(fit);
            candidates.push(self.weights.clone());
            pb.tick();
        }

        let picks = pick_columns(&fits, self.n_factors());
        for (f, h) in picks.iter().enumerate() {
            debug!("factor {}: picked restart {} (fit {:.4})", f, h, fits[*h][f]);
        }
        self.weights = splice_columns(&candidates, &picks);
        self.report = MappingFit {
            restarts: fits,
            picks,
        };
        self.set_mode(MapperMode::Serving);
        Ok(())
    }

    /// One gradient step for one example, descending only where the mapped
    /// value exceeds the target.
    fn step(&mut self, rows: &[usize], target: ArrayView1<'_, f32>) {
        let est = self.map_rows(rows);
        let lr = self.config.learn_rate;
        let reg = self.config.regularization;
        let bias = self.n_attributes();
        for f in 0..self.n_factors() {
            let diff = est[f] - target[f];
            if diff > 0.0 {
                for r in rows.iter().copied().chain(std::iter::once(bias)) {
                    let w = self.weights[(r, f)];
                    self.weights[(r, f)] = w - lr * (diff + reg * w);
                }
            }
        }
    }

    fn fit_columns(&self, rows: &[Vec<usize>], targets: ArrayView2<'_, f32>) -> Vec<f64> {
        let mut est = Array2::zeros(targets.dim());
        for (k, r) in rows.iter().enumerate() {
            est.row_mut(k).assign(&self.map_rows(r));
        }
        column_fit(est.view(), targets, self.weights.view(), self.config.regularization)
    }

    pub fn memory_size(&self) -> usize {
        self.weights.len() * 4
    }

    pub fn to_archive(&self) -> ModelArchive {
        let mut ar = ModelArchive::new(ARCHIVE_KIND);
        ar.push_matrix("attribute_to_factor", &self.weights);
        ar
    }

    /// Load weights from an archive; the mapper is left in serving mode.
    pub fn load_archive(&mut self, ar: &ModelArchive) -> Result<()> {
        ar.expect_kind(ARCHIVE_KIND)?;
        let w = ar.matrix("attribute_to_factor")?;
        if w.nrows() != self.weights.nrows() {
            return Err(Error::shape("mapper rows", self.weights.nrows(), w.nrows()));
        }
        if w.ncols() != self.weights.ncols() {
            return Err(Error::shape("mapper columns", self.weights.ncols(), w.ncols()));
        }
        self.weights = w;
        self.report = MappingFit::default();
        self.set_mode(MapperMode::Serving);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BooleanMatrix;
    use ndarray::array;

    fn one_hot(n: usize) -> AttributeSpaces {
        let rows: Vec<Vec<u32>> = (0..n as u32).map(|k| vec![k]).collect();
        AttributeSpaces::new(BooleanMatrix::from_rows(&rows, n))
    }

    fn config() -> MapperConfig {
        MapperConfig {
            num_restarts: 3,
            num_iter: 3000,
            learn_rate: 0.005,
            regularization: 0.001,
            init_mean: 1.5,
            init_stddev: 0.01,
            ..MapperConfig::default()
        }
    }

    #[test]
    fn test_fits_shared_vector() {
        let t = [0.5, -0.3, 0.8];
        let targets = Array2::from_shape_fn((4, 3), |(_, f)| t[f]);
        let mapper = AttributeMapper::fit(config(), one_hot(4), targets.view(), &[true; 4]).expect("mapper fit");
        assert_eq!(mapper.mode(), MapperMode::Serving);
        let best = mapper.report().best();
        assert_eq!(best.len(), 3);
        for fit in best {
            assert!(fit < 0.1, "fit {}", fit);
        }
        for e in 0..4 {
            let v = mapper.map(e);
            for f in 0..3 {
                assert!((v[f] - t[f]).abs() < 0.2);
            }
        }
    }

    #[test]
    fn test_orthogonal_targets() {
        let targets = Array2::eye(3);
        let mapper = AttributeMapper::fit(config(), one_hot(3), targets.view(), &[true; 3]).expect("mapper fit");
        for fit in mapper.report().best() {
            // the one-sided gate leaves some error on the shared bias row
            assert!(fit < 0.35, "fit {}", fit);
        }
    }

    #[test]
    fn test_picks_best_restart_per_column() {
        let targets = Array2::eye(3);
        let cfg = MapperConfig {
            num_restarts: 4,
            init_stddev: 0.5,
            num_iter: 200,
            ..config()
        };
        let mapper = AttributeMapper::fit(cfg, one_hot(3), targets.view(), &[true; 3]).expect("mapper fit");
        let report = mapper.report();
        assert_eq!(report.restarts.len(), 4);
        for (f, h) in report.picks.iter().enumerate() {
            for other in &report.restarts {
                assert!(report.restarts[*h][f] <= other[f]);
            }
        }
    }

    #[test]
    fn test_zero_attributes_bias_row() {
        let attrs = AttributeSpaces::new(BooleanMatrix::from_rows(&[vec![0], vec![1], vec![]], 2));
        let targets = array![[1.0, 0.0], [0.0, 1.0], [0.0, 0.0]];
        let mapper = AttributeMapper::fit(config(), attrs, targets.view(), &[true, true, true]).expect("mapper fit");
        assert_eq!(mapper.map(2), mapper.bias_row().to_owned());
        assert_eq!(mapper.map(99), mapper.bias_row().to_owned());
        assert!(mapper.covers(2));
        assert!(!mapper.covers(99));
        assert_eq!(mapper.map_attributes(&[]).expect("valid"), mapper.bias_row().to_owned());
        assert!(mapper.map_attributes(&[7]).is_err());
    }

    #[test]
    fn test_memoized_identical() {
        let targets = Array2::eye(3);
        let mut mapper = AttributeMapper::fit(config(), one_hot(3), targets.view(), &[true; 3]).expect("mapper fit");
        let first = mapper.map(1);
        let second = mapper.map(1);
        assert_eq!(first, second);

        // training mode recomputes from the current weights
        mapper.set_mode(MapperMode::Training);
        mapper.weights.fill(0.0);
        assert_eq!(mapper.map(1), Array1::<f32>::zeros(3));
    }

    #[test]
    fn test_additional_space_offsets() {
        let primary = BooleanMatrix::from_rows(&[vec![0], vec![1]], 2);
        let extra = BooleanMatrix::from_rows(&[vec![0], vec![0]], 1);
        let attrs = AttributeSpaces::new(primary).with_additional(vec![extra]);
        let mut mapper = AttributeMapper::new(MapperConfig::default(), attrs, 1).expect("mapper");
        assert_eq!(mapper.n_attributes(), 3);
        assert_eq!(mapper.space_offset(1), Some(2));
        mapper.weights = array![[1.0], [2.0], [10.0], [100.0]];
        assert_eq!(mapper.map(0)[0], 111.0);
        assert_eq!(mapper.map(1)[0], 112.0);
    }

    #[test]
    fn test_no_examples() {
        let attrs = AttributeSpaces::new(BooleanMatrix::from_rows(&[vec![], vec![0]], 1));
        let targets = Array2::zeros((2, 2));
        let res = AttributeMapper::fit(config(), attrs, targets.view(), &[true, false]);
        assert!(matches!(res, Err(Error::NoMappingExamples)));
    }

    #[test]
    fn test_archive() {
        let targets = Array2::eye(2);
        let mapper = AttributeMapper::fit(config(), one_hot(2), targets.view(), &[true; 2]).expect("mapper fit");
        let ar = mapper.to_archive();
        let mut other = AttributeMapper::new(config(), one_hot(2), 2).expect("mapper");
        other.load_archive(&ar).expect("load");
        assert_eq!(other.map(0), mapper.map(0));

        let mut wrong = AttributeMapper::new(config(), one_hot(3), 2).expect("mapper");
        assert!(matches!(wrong.load_archive(&ar), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_archive_factor_count_checked() {
        let mut ar = ModelArchive::new(ARCHIVE_KIND);
        ar.push_matrix("attribute_to_factor", &Array2::zeros((3, 5)));
        let mut mapper = AttributeMapper::new(config(), one_hot(2), 2).expect("mapper");
        assert!(matches!(mapper.load_archive(&ar), Err(Error::ShapeMismatch { .. })));
        assert_eq!(mapper.n_factors(), 2);
        assert_eq!(mapper.mode(), MapperMode::Training);
    }
}
