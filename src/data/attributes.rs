// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Boolean side-information matrices.

use crate::sparse::{COOBuilder, CSRStructure, CSR};

/// Boolean sparse incidence from entity IDs to attribute (or related-user) IDs.
#[derive(Debug, Clone, Default)]
pub struct BooleanMatrix {
    csr: CSRStructure,
}

impl BooleanMatrix {
    /// Create a matrix with no entries.
    pub fn empty(n_rows: usize, n_cols: usize) -> BooleanMatrix {
        BooleanMatrix {
            csr: CSRStructure::empty(n_rows, n_cols),
        }
    }

    /// Build a matrix from (entity, attribute) pairs.
    ///
    /// The dimensions are at least `n_rows` × `n_cols`, growing to fit the pairs.
    pub fn from_pairs<I: IntoIterator<Item = (u32, u32)>>(
        pairs: I,
        n_rows: usize,
        n_cols: usize,
    ) -> BooleanMatrix {
        let mut bld = COOBuilder::default();
        for (r, c) in pairs {
            bld.add_entry(r, c);
        }
        BooleanMatrix {
            csr: bld.finish(n_rows, n_cols),
        }
    }

    /// Build a matrix from one attribute list per entity.
    pub fn from_rows<R: AsRef<[u32]>>(rows: &[R], n_cols: usize) -> BooleanMatrix {
        let pairs = rows
            .iter()
            .enumerate()
            .flat_map(|(r, cols)| cols.as_ref().iter().map(move |c| (r as u32, *c)));
        BooleanMatrix::from_pairs(pairs, rows.len(), n_cols)
    }

    /// The attributes of an entity; empty for entities beyond the matrix.
    pub fn row(&self, entity: u32) -> &[u32] {
        self.csr.row_cols(entity as usize)
    }

    pub fn has_row(&self, entity: u32) -> bool {
        (entity as usize) < self.csr.n_rows
    }

    pub fn contains(&self, entity: u32, attribute: u32) -> bool {
        self.csr.contains(entity as usize, attribute)
    }

    pub fn n_rows(&self) -> usize {
        self.csr.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.csr.n_cols
    }

    pub fn nnz(&self) -> usize {
        self.csr.nnz()
    }

    /// Number of entities having each attribute.
    pub fn col_counts(&self) -> Vec<u32> {
        self.csr.col_counts()
    }
}

/// A primary attribute matrix plus additional, independently scored attribute spaces.
#[derive(Debug, Clone, Default)]
pub struct AttributeSpaces {
    pub primary: BooleanMatrix,
    pub additional: Vec<BooleanMatrix>,
}

impl AttributeSpaces {
    pub fn new(primary: BooleanMatrix) -> AttributeSpaces {
        AttributeSpaces {
            primary,
            additional: Vec::new(),
        }
    }

    pub fn with_additional(mut self, additional: Vec<BooleanMatrix>) -> AttributeSpaces {
        self.additional = additional;
        self
    }

    /// Iterate over all spaces, primary first.
    pub fn spaces(&self) -> impl Iterator<Item = &BooleanMatrix> {
        std::iter::once(&self.primary).chain(self.additional.iter())
    }

    pub fn len(&self) -> usize {
        1 + self.additional.len()
    }

    /// Largest number of entity rows across all spaces.
    pub fn max_rows(&self) -> usize {
        self.spaces().map(|s| s.n_rows()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let m = BooleanMatrix::from_rows(&[vec![5], vec![6], vec![]], 0);
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.n_cols(), 7);
        assert_eq!(m.row(0), &[5]);
        assert_eq!(m.row(1), &[6]);
        assert!(m.row(2).is_empty());
        assert!(m.row(9).is_empty());
        assert!(!m.has_row(9));
        assert!(m.contains(1, 6));
    }

    #[test]
    fn test_col_counts() {
        let m = BooleanMatrix::from_pairs(vec![(0, 1), (1, 1), (1, 0)], 0, 3);
        assert_eq!(m.col_counts(), vec![1, 2, 0]);
    }

    #[test]
    fn test_spaces() {
        let spaces = AttributeSpaces::new(BooleanMatrix::empty(2, 3))
            .with_additional(vec![BooleanMatrix::empty(4, 1)]);
        assert_eq!(spaces.len(), 2);
        assert_eq!(spaces.max_rows(), 4);
        assert_eq!(spaces.spaces().count(), 2);
    }
}
