// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Arrow conversion utilities.

use arrow::array::{Array, Float32Array, Int32Array};
use arrow_schema::DataType;

use crate::errors::{Error, Result};

use super::{BooleanMatrix, Interactions};

/// Downcast an Arrow array, reporting a type error if it has the wrong type.
pub(crate) fn checked_array_convert<'array, T: Array + 'static>(
    name: &str,
    expected: &DataType,
    array: &'array dyn Array,
) -> Result<&'array T> {
    if array.data_type() != expected {
        return Err(type_error(name, array, expected));
    }
    array
        .as_any()
        .downcast_ref()
        .ok_or_else(|| type_error(name, array, expected))
}

fn type_error(name: &str, array: &dyn Array, expected: &DataType) -> Error {
    Error::ArrowType {
        name: name.into(),
        actual: format!("{}", array.data_type()),
        expected: format!("{}", expected),
    }
}

/// Extract non-negative identifiers from an Int32 column.
pub(crate) fn id_column(name: &str, array: &dyn Array) -> Result<Vec<u32>> {
    let ids: &Int32Array = checked_array_convert(name, &DataType::Int32, array)?;
    if ids.null_count() > 0 {
        return Err(Error::InconsistentRecords(format!(
            "{} column has {} nulls",
            name,
            ids.null_count()
        )));
    }
    ids.values()
        .iter()
        .map(|v| {
            u32::try_from(*v).map_err(|_| {
                Error::InconsistentRecords(format!("{} column has negative ID {}", name, v))
            })
        })
        .collect()
}

impl Interactions {
    /// Build the store from Arrow user, item, and optional rating columns.
    pub fn from_arrow(
        users: &dyn Array,
        items: &dyn Array,
        ratings: Option<&dyn Array>,
    ) -> Result<Interactions> {
        let users = id_column("users", users)?;
        let items = id_column("items", items)?;
        if users.len() != items.len() {
            return Err(Error::shape("item column", users.len(), items.len()));
        }

        let ratings = match ratings {
            Some(arr) => {
                let vals: &Float32Array =
                    checked_array_convert("ratings", &DataType::Float32, arr)?;
                if vals.len() != users.len() {
                    return Err(Error::shape("rating column", users.len(), vals.len()));
                }
                if vals.null_count() > 0 {
                    return Err(Error::InconsistentRecords(format!(
                        "ratings column has {} nulls",
                        vals.null_count()
                    )));
                }
                Some(vals.values().to_vec())
            }
            None => None,
        };

        Ok(Interactions::from_columns(users, items, ratings))
    }
}

impl BooleanMatrix {
    /// Build a boolean matrix from Arrow row and column index columns.
    pub fn from_arrow(
        rows: &dyn Array,
        cols: &dyn Array,
        n_rows: usize,
        n_cols: usize,
    ) -> Result<BooleanMatrix> {
        let rows = id_column("rows", rows)?;
        let cols = id_column("columns", cols)?;
        if rows.len() != cols.len() {
            return Err(Error::shape("column index", rows.len(), cols.len()));
        }
        Ok(BooleanMatrix::from_pairs(
            rows.into_iter().zip(cols),
            n_rows,
            n_cols,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;

    #[test]
    fn test_from_arrow_implicit() {
        let users = Int32Array::from(vec![0, 0, 1]);
        let items = Int32Array::from(vec![1, 2, 2]);
        let data = Interactions::from_arrow(&users, &items, None).expect("valid columns");
        assert_eq!(data.n_users(), 2);
        assert_eq!(data.n_items(), 3);
        assert_eq!(data.user_items(0), &[1, 2]);
        assert!(!data.has_ratings());
    }

    #[test]
    fn test_from_arrow_ratings() {
        let users = Int32Array::from(vec![0, 1]);
        let items = Int32Array::from(vec![1, 0]);
        let ratings = Float32Array::from(vec![3.5, 1.0]);
        let data = Interactions::from_arrow(&users, &items, Some(&ratings as &dyn Array))
            .expect("valid columns");
        assert_eq!(data.ratings(), Some(&[3.5, 1.0][..]));
    }

    #[test]
    fn test_from_arrow_bad_type() {
        let users = Int64Array::from(vec![0, 1]);
        let items = Int32Array::from(vec![1, 0]);
        let res = Interactions::from_arrow(&users, &items, None);
        assert!(matches!(res, Err(Error::ArrowType { .. })));
    }

    #[test]
    fn test_from_arrow_negative() {
        let users = Int32Array::from(vec![0, -1]);
        let items = Int32Array::from(vec![1, 0]);
        let res = Interactions::from_arrow(&users, &items, None);
        assert!(matches!(res, Err(Error::InconsistentRecords(_))));
    }

    #[test]
    fn test_matrix_from_arrow() {
        let rows = Int32Array::from(vec![0, 1, 1]);
        let cols = Int32Array::from(vec![5, 6, 2]);
        let m = BooleanMatrix::from_arrow(&rows, &cols, 3, 0).expect("valid columns");
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.n_cols(), 7);
        assert_eq!(m.row(1), &[2, 6]);
    }
}
