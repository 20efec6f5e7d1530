// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Sparse coordinate builders.

use super::CSRStructure;

/// Accumulate (row, column) coordinates and compress them into CSR form.
#[derive(Debug, Default, Clone)]
pub struct COOBuilder {
    rows: Vec<u32>,
    cols: Vec<u32>,
    max_row: Option<u32>,
    max_col: Option<u32>,
}

impl COOBuilder {
    /// Initialize a builder with a specified capacity.
    pub fn with_capacity(cap: usize) -> Self {
        COOBuilder {
            rows: Vec::with_capacity(cap),
            cols: Vec::with_capacity(cap),
            max_row: None,
            max_col: None,
        }
    }

    pub fn add_entry(&mut self, row: u32, col: u32) {
        self.rows.push(row);
        self.cols.push(col);
        self.max_row = self.max_row.max(Some(row));
        self.max_col = self.max_col.max(Some(col));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Number of rows implied by the largest row index seen.
    pub fn implied_rows(&self) -> usize {
        self.max_row.map(|r| r as usize + 1).unwrap_or(0)
    }

    /// Number of columns implied by the largest column index seen.
    pub fn implied_cols(&self) -> usize {
        self.max_col.map(|c| c as usize + 1).unwrap_or(0)
    }

    /// Build the CSR structure, sorting and removing duplicate coordinates.
    ///
    /// The dimensions are the larger of the requested ones and the implied ones.
    pub fn finish(self, n_rows: usize, n_cols: usize) -> CSRStructure {
        let n_rows = n_rows.max(self.implied_rows());
        let n_cols = n_cols.max(self.implied_cols());

        // counting sort by row
        let mut row_ptrs = vec![0usize; n_rows + 1];
        for r in &self.rows {
            row_ptrs[*r as usize + 1] += 1;
        }
        for i in 1..=n_rows {
            row_ptrs[i] += row_ptrs[i - 1];
        }
        let mut fill = row_ptrs.clone();
        let mut cols = vec![0u32; self.rows.len()];
        for (r, c) in self.rows.iter().zip(self.cols.iter()) {
            let pos = &mut fill[*r as usize];
            cols[*pos] = *c;
            *pos += 1;
        }

        // sort and dedup each row, compacting as we go
        let mut out_ptrs = Vec::with_capacity(n_rows + 1);
        let mut out_cols = Vec::with_capacity(cols.len());
        out_ptrs.push(0);
        for r in 0..n_rows {
            let row = &mut cols[row_ptrs[r]..row_ptrs[r + 1]];
            row.sort_unstable();
            let mut last = None;
            for c in row.iter() {
                if last != Some(*c) {
                    out_cols.push(*c);
                    last = Some(*c);
                }
            }
            out_ptrs.push(out_cols.len());
        }

        CSRStructure::from_parts(n_rows, n_cols, out_ptrs, out_cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::CSR;

    #[test]
    fn test_build_sorted_dedup() {
        let mut bld = COOBuilder::with_capacity(6);
        bld.add_entry(1, 3);
        bld.add_entry(0, 2);
        bld.add_entry(1, 0);
        bld.add_entry(1, 3);
        bld.add_entry(0, 1);
        assert_eq!(bld.len(), 5);
        let csr = bld.finish(0, 0);
        assert_eq!(csr.n_rows, 2);
        assert_eq!(csr.n_cols, 4);
        assert_eq!(csr.nnz(), 4);
        assert_eq!(csr.row_cols(0), &[1, 2]);
        assert_eq!(csr.row_cols(1), &[0, 3]);
    }

    #[test]
    fn test_requested_dims() {
        let mut bld = COOBuilder::default();
        bld.add_entry(0, 0);
        let csr = bld.finish(3, 5);
        assert_eq!(csr.n_rows, 3);
        assert_eq!(csr.n_cols, 5);
        assert!(csr.row_cols(2).is_empty());
    }

    #[test]
    fn test_empty() {
        let csr = COOBuilder::default().finish(0, 0);
        assert_eq!(csr.len(), 0);
        assert_eq!(csr.nnz(), 0);
    }
}
