// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

/// A compressed sparse row matrix with only structure, not values.
///
/// Column indices within each row are sorted and unique.
#[derive(Debug, Clone, Default)]
pub struct CSRStructure {
    pub n_rows: usize,
    pub n_cols: usize,
    pub(crate) row_ptrs: Vec<usize>,
    pub(crate) col_inds: Vec<u32>,
}

/// Common methods for compressed sparse row matrices.
pub trait CSR {
    /// Get the row pointers as a slice.
    fn row_ptrs(&self) -> &[usize];
    /// Get the column indices.
    fn col_inds(&self) -> &[u32];

    /// Get the "length" (number of rows) in the matrix.
    fn len(&self) -> usize {
        self.row_ptrs().len() - 1
    }

    /// Get the number of observed values in the matrix.
    fn nnz(&self) -> usize {
        self.row_ptrs()[self.len()]
    }

    /// Get the extent in the underlying arrays for a row in the matrix.
    ///
    /// Rows beyond the end of the matrix are empty.
    fn extent(&self, row: usize) -> (usize, usize) {
        if row >= self.len() {
            let end = self.nnz();
            return (end, end);
        }
        let off = self.row_ptrs();
        (off[row], off[row + 1])
    }

    /// Get the column indices for a row in the matrix.
    fn row_cols(&self, row: usize) -> &[u32] {
        let (start, end) = self.extent(row);
        &self.col_inds()[start..end]
    }

    /// Get the number of entries in a row.
    fn row_len(&self, row: usize) -> usize {
        let (start, end) = self.extent(row);
        end - start
    }
}

impl CSRStructure {
    /// Create an empty matrix with the specified number of rows and columns.
    pub fn empty(n_rows: usize, n_cols: usize) -> CSRStructure {
        CSRStructure {
            n_rows,
            n_cols,
            row_ptrs: vec![0; n_rows + 1],
            col_inds: Vec::new(),
        }
    }

    /// Assemble a matrix from raw parts.
    pub(crate) fn from_parts(
        n_rows: usize,
        n_cols: usize,
        row_ptrs: Vec<usize>,
        col_inds: Vec<u32>,
    ) -> CSRStructure {
        assert_eq!(row_ptrs.len(), n_rows + 1);
        assert_eq!(row_ptrs[n_rows], col_inds.len());
        CSRStructure {
            n_rows,
            n_cols,
            row_ptrs,
            col_inds,
        }
    }

    /// Test whether the matrix has an entry at a row and column.
    ///
    /// This uses binary search within the row.
    pub fn contains(&self, row: usize, col: u32) -> bool {
        self.row_cols(row).binary_search(&col).is_ok()
    }

    /// Count the entries in each column.
    pub fn col_counts(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.n_cols];
        for c in &self.col_inds {
            counts[*c as usize] += 1;
        }
        counts
    }

    /// Extend the matrix with empty rows so it has at least `n_rows` rows.
    pub fn extend_rows(&mut self, n_rows: usize) {
        if n_rows > self.n_rows {
            let end = self.nnz();
            self.row_ptrs.resize(n_rows + 1, end);
            self.n_rows = n_rows;
        }
    }
}

impl CSR for CSRStructure {
    fn row_ptrs(&self) -> &[usize] {
        &self.row_ptrs
    }
    fn col_inds(&self) -> &[u32] {
        &self.col_inds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> CSRStructure {
        CSRStructure::from_parts(3, 4, vec![0, 2, 2, 3], vec![0, 3, 1])
    }

    #[test]
    fn test_rows() {
        let csr = small();
        assert_eq!(csr.len(), 3);
        assert_eq!(csr.nnz(), 3);
        assert_eq!(csr.row_cols(0), &[0, 3]);
        assert!(csr.row_cols(1).is_empty());
        assert_eq!(csr.row_cols(2), &[1]);
    }

    #[test]
    fn test_missing_row_is_empty() {
        let csr = small();
        assert!(csr.row_cols(10).is_empty());
        assert_eq!(csr.row_len(10), 0);
        assert!(!csr.contains(10, 0));
    }

    #[test]
    fn test_contains_and_counts() {
        let csr = small();
        assert!(csr.contains(0, 3));
        assert!(!csr.contains(0, 1));
        assert_eq!(csr.col_counts(), vec![1, 1, 0, 1]);
    }

    #[test]
    fn test_extend_rows() {
        let mut csr = small();
        csr.extend_rows(5);
        assert_eq!(csr.len(), 5);
        assert_eq!(csr.nnz(), 3);
        assert!(csr.row_cols(4).is_empty());
        assert_eq!(csr.row_cols(2), &[1]);
    }
}
