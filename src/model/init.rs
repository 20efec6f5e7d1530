// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Random initialization.

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64;

use crate::errors::{Error, Result};

/// Create the generator owned by a trainer or mapper.
pub fn make_rng(seed: u64) -> Pcg64 {
    Pcg64::seed_from_u64(seed)
}

/// Fill a new matrix with normally-distributed values.
pub fn normal_matrix<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    mean: f32,
    stddev: f32,
    rng: &mut R,
) -> Result<Array2<f32>> {
    let dist = Normal::new(mean, stddev)
        .map_err(|e| Error::InvalidConfig(format!("normal({}, {}): {}", mean, stddev, e)))?;
    Ok(Array2::from_shape_simple_fn((rows, cols), || dist.sample(rng)))
}

#[test]
fn test_normal_matrix() {
    let mut rng = make_rng(5);
    let m = normal_matrix(200, 10, 1.0, 0.1, &mut rng).expect("valid normal");
    assert_eq!(m.dim(), (200, 10));
    let mean = m.mean().unwrap_or(0.0);
    assert!((mean - 1.0).abs() < 0.02);
}

#[test]
fn test_normal_matrix_bad_stddev() {
    let mut rng = make_rng(5);
    let res = normal_matrix(2, 2, 0.0, f32::NAN, &mut rng);
    assert!(matches!(res, Err(Error::InvalidConfig(_))));
}
