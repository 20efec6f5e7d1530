// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Row-column sets for quick masking.

use rustc_hash::FxHashSet;

use super::{CSRStructure, CSR};

/// Hash set of (row, column) pairs for constant-time containment tests.
#[derive(Debug, Clone, Default)]
pub struct RowColumnSet {
    set: FxHashSet<(u32, u32)>,
}

impl RowColumnSet {
    pub fn from_csr(matrix: &CSRStructure) -> Self {
        let mut set = FxHashSet::default();
        set.reserve(matrix.nnz());

        for r in 0..matrix.len() {
            for c in matrix.row_cols(r) {
                set.insert((r as u32, *c));
            }
        }

        RowColumnSet { set }
    }

    pub fn contains_pair(&self, row: u32, col: u32) -> bool {
        self.set.contains(&(row, col))
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }
}

#[test]
fn test_rc_set() {
    let csr = CSRStructure::from_parts(2, 3, vec![0, 1, 3], vec![2, 0, 2]);
    let set = RowColumnSet::from_csr(&csr);
    assert_eq!(set.len(), 3);
    assert!(set.contains_pair(0, 2));
    assert!(set.contains_pair(1, 0));
    assert!(!set.contains_pair(0, 0));
    assert!(!set.contains_pair(5, 2));
}
