// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

use super::{CSRStructure, CSR};

/// Transpose the matrix structure.
///
/// Because rows are visited in order, the transposed rows come out sorted.
pub fn transpose_structure(csr: &CSRStructure) -> CSRStructure {
    let nnz = csr.nnz();
    let mut row_ptrs = vec![0usize; csr.n_cols + 1];
    let mut col_inds = vec![0u32; nnz];

    // step 1: count column values, placing counts in rps[c+1].
    for c in csr.col_inds() {
        row_ptrs[*c as usize + 1] += 1;
    }

    // step 2: convert column counts into row offsets
    for i in 1..=csr.n_cols {
        row_ptrs[i] += row_ptrs[i - 1];
    }

    // step 3: insert column indices into outputs
    let mut row_ips = row_ptrs.clone();
    for row in 0..csr.n_rows {
        for cv in csr.row_cols(row) {
            let pos = &mut row_ips[*cv as usize];
            col_inds[*pos] = row as u32;
            *pos += 1;
        }
    }

    CSRStructure::from_parts(csr.n_cols, csr.n_rows, row_ptrs, col_inds)
}

#[test]
fn test_transpose_small() {
    let csr = CSRStructure::from_parts(3, 4, vec![0, 2, 3, 5], vec![0, 1, 1, 2, 3]);
    let t = transpose_structure(&csr);
    assert_eq!(t.n_rows, 4);
    assert_eq!(t.n_cols, 3);
    assert_eq!(t.row_cols(0), &[0]);
    assert_eq!(t.row_cols(1), &[0, 1]);
    assert_eq!(t.row_cols(2), &[2]);
    assert_eq!(t.row_cols(3), &[2]);
}

#[test]
fn test_transpose_roundtrip_structure() {
    let csr = CSRStructure::from_parts(2, 3, vec![0, 1, 3], vec![2, 0, 2]);
    let back = transpose_structure(&transpose_structure(&csr));
    assert_eq!(back.row_ptrs(), csr.row_ptrs());
    assert_eq!(back.col_inds(), csr.col_inds());
}
