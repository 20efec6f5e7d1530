// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Error types for training and scoring.

use thiserror::Error;

/// Errors raised by the latent-factor training engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{what} dimension mismatch: expected {expected}, found {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
    #[error("model archive has no array named {0}")]
    MissingArray(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("no user has at least one and fewer than all items")]
    NoEligibleUser,
    #[error("no entity has both interactions and attributes")]
    NoMappingExamples,
    #[error("training data has no ratings")]
    MissingRatings,
    #[error("inconsistent interaction records: {0}")]
    InconsistentRecords(String),
    #[error("invalid {name} type {actual}, expected {expected}")]
    ArrowType {
        name: String,
        actual: String,
        expected: String,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Result type for latent-factor operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Error {
        Error::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

/// Convert an option into a result with a formatted error.
#[macro_export]
macro_rules! ok_or_err {
    ($opt:expr, $variant:path, $($arg:expr),*) => {
        $opt.ok_or_else(|| $variant(format!($($arg),*)))
    };
}

#[cfg(feature = "python")]
impl From<Error> for pyo3::PyErr {
    fn from(value: Error) -> Self {
        use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
        let msg = format!("{}", value);
        match value {
            Error::ArrowType { .. } => PyTypeError::new_err(msg),
            Error::ShapeMismatch { .. }
            | Error::InvalidConfig(_)
            | Error::MissingArray(_)
            | Error::MissingRatings
            | Error::InconsistentRecords(_) => PyValueError::new_err(msg),
            _ => PyRuntimeError::new_err(msg),
        }
    }
}

#[test]
fn test_ok_or_err_formats_message() {
    let missing: Option<u32> = None;
    let res = ok_or_err!(missing, Error::MissingArray, "array {}", "user_factors");
    match res {
        Err(Error::MissingArray(name)) => assert_eq!(name, "array user_factors"),
        _ => panic!("expected missing array error"),
    }
}

#[test]
fn test_shape_message() {
    let err = Error::shape("item bias", 4, 3);
    assert_eq!(
        format!("{}", err),
        "item bias dimension mismatch: expected 4, found 3"
    );
}
