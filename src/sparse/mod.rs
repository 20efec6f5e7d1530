// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Sparse matrix support.

mod coo;
mod csr;
mod rc_set;
mod transpose;

pub use coo::COOBuilder;
pub use csr::{CSRStructure, CSR};
pub use rc_set::RowColumnSet;
pub use transpose::transpose_structure;
