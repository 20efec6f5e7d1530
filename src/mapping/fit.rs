// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Fit measurement and the per-column restart pick.

use ndarray::{Array2, ArrayView2, Axis};
use serde::Serialize;

/// Per-factor fit of every restart, and the restart chosen for each column.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MappingFit {
    /// `restarts[h][f]` is the fit of column `f` at the end of restart `h`.
    pub restarts: Vec<Vec<f64>>,
    /// Winning restart for each column.
    pub picks: Vec<usize>,
}

impl MappingFit {
    /// Fit of the spliced mapper, per column.
    pub fn best(&self) -> Vec<f64> {
        self.picks
            .iter()
            .enumerate()
            .map(|(f, h)| self.restarts[*h][f])
            .collect()
    }
}

/// Compute `sqrt(mean squared error) + reg·‖column‖₂` for each factor column.
///
/// `estimates` and `targets` hold one row per example.
pub(super) fn column_fit(
    estimates: ArrayView2<'_, f32>,
    targets: ArrayView2<'_, f32>,
    weights: ArrayView2<'_, f32>,
    reg: f32,
) -> Vec<f64> {
    let n = estimates.nrows().max(1) as f64;
    estimates
        .axis_iter(Axis(1))
        .zip(targets.axis_iter(Axis(1)))
        .zip(weights.axis_iter(Axis(1)))
        .map(|((est, tgt), col)| {
            let sse: f64 = est
                .iter()
                .zip(tgt.iter())
                .map(|(e, t)| {
                    let d = (*e - *t) as f64;
                    d * d
                })
                .sum();
            let norm: f64 = col.iter().map(|w| (*w as f64) * (*w as f64)).sum::<f64>().sqrt();
            (sse / n).sqrt() + reg as f64 * norm
        })
        .collect()
}

/// Choose, independently for each column, the restart with the lowest fit.
///
/// Ties go to the earliest restart.
pub(super) fn pick_columns(fits: &[Vec<f64>], n_factors: usize) -> Vec<usize> {
    (0..n_factors)
        .map(|f| {
            let mut best = 0;
            for (h, fit) in fits.iter().enumerate() {
                if fit[f] < fits[best][f] {
                    best = h;
                }
            }
            best
        })
        .collect()
}

/// Assemble a weight matrix taking each column from its winning restart.
pub(super) fn splice_columns(candidates: &[Array2<f32>], picks: &[usize]) -> Array2<f32> {
    let (rows, cols) = candidates[0].dim();
    let mut out = Array2::zeros((rows, cols));
    for (f, h) in picks.iter().enumerate() {
        out.column_mut(f).assign(&candidates[*h].column(f));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_column_fit() {
        let est = array![[1.0, 0.0], [1.0, 2.0]];
        let tgt = array![[1.0, 0.0], [1.0, 0.0]];
        let w = array![[3.0, 0.0], [4.0, 0.0]];
        let fit = column_fit(est.view(), tgt.view(), w.view(), 0.1);
        assert!((fit[0] - 0.5).abs() < 1e-6);
        assert!((fit[1] - 2f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_pick_and_splice() {
        let fits = vec![vec![0.5, 0.1, 0.3], vec![0.2, 0.4, 0.3]];
        let picks = pick_columns(&fits, 3);
        assert_eq!(picks, vec![1, 0, 0]);

        let a = Array2::from_elem((2, 3), 1.0);
        let b = Array2::from_elem((2, 3), 2.0);
        let out = splice_columns(&[a, b], &picks);
        assert_eq!(out, array![[2.0, 1.0, 1.0], [2.0, 1.0, 1.0]]);

        let report = MappingFit {
            restarts: fits,
            picks,
        };
        assert_eq!(report.best(), vec![0.2, 0.1, 0.3]);
    }
}
