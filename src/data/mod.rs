// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Training data: interactions and side information.

mod arrow;
mod attributes;
mod interactions;

#[cfg(feature = "python")]
pub(crate) use arrow::id_column;
pub use attributes::{AttributeSpaces, BooleanMatrix};
pub use interactions::{Interaction, Interactions};

/// Boolean user-user relations (e.g. a social graph).
pub type RelationMatrix = BooleanMatrix;
