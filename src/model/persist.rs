// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Named-array model archives.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::*;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::ok_or_err;

/// A named array with its shape and row-major values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArray {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// A serializable collection of model arrays and scalars.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelArchive {
    pub kind: String,
    pub arrays: Vec<NamedArray>,
    #[serde(default)]
    pub scalars: BTreeMap<String, f32>,
}

impl ModelArchive {
    pub fn new(kind: &str) -> ModelArchive {
        ModelArchive {
            kind: kind.into(),
            ..ModelArchive::default()
        }
    }

    pub fn push_matrix(&mut self, name: &str, matrix: &Array2<f32>) {
        self.arrays.push(NamedArray {
            name: name.into(),
            shape: vec![matrix.nrows(), matrix.ncols()],
            values: matrix.iter().copied().collect(),
        });
    }

    pub fn push_vector(&mut self, name: &str, vector: &Array1<f32>) {
        self.arrays.push(NamedArray {
            name: name.into(),
            shape: vec![vector.len()],
            values: vector.to_vec(),
        });
    }

    pub fn set_scalar(&mut self, name: &str, value: f32) {
        self.scalars.insert(name.into(), value);
    }

    pub fn has_array(&self, name: &str) -> bool {
        self.arrays.iter().any(|a| a.name == name)
    }

    fn array(&self, name: &str) -> Result<&NamedArray> {
        let arr = ok_or_err!(
            self.arrays.iter().find(|a| a.name == name),
            Error::MissingArray,
            "{}",
            name
        )?;
        let size: usize = arr.shape.iter().product();
        if size != arr.values.len() {
            return Err(Error::shape(
                format!("{} value count", name),
                size,
                arr.values.len(),
            ));
        }
        Ok(arr)
    }

    pub fn matrix(&self, name: &str) -> Result<Array2<f32>> {
        let arr = self.array(name)?;
        if arr.shape.len() != 2 {
            return Err(Error::shape(format!("{} rank", name), 2, arr.shape.len()));
        }
        Ok(Array2::from_shape_vec(
            (arr.shape[0], arr.shape[1]),
            arr.values.clone(),
        )?)
    }

    pub fn vector(&self, name: &str) -> Result<Array1<f32>> {
        let arr = self.array(name)?;
        if arr.shape.len() != 1 {
            return Err(Error::shape(format!("{} rank", name), 1, arr.shape.len()));
        }
        Ok(Array1::from_vec(arr.values.clone()))
    }

    pub fn scalar(&self, name: &str) -> Result<f32> {
        ok_or_err!(
            self.scalars.get(name).copied(),
            Error::MissingArray,
            "{}",
            name
        )
    }

    /// Check that the archive holds the expected kind of model.
    pub fn expect_kind(&self, kind: &str) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "archive holds a {} model, expected {}",
                self.kind, kind
            )))
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<ModelArchive> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        debug!(
            "saving {} archive with {} arrays to {}",
            self.kind,
            self.arrays.len(),
            path.display()
        );
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<ModelArchive> {
        let text = fs::read_to_string(path)?;
        let ar = ModelArchive::from_json(&text)?;
        debug!("loaded {} archive from {}", ar.kind, path.display());
        Ok(ar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_matrix_layout() {
        let mut ar = ModelArchive::new("test");
        ar.push_matrix("m", &array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(ar.arrays[0].shape, vec![2, 3]);
        assert_eq!(ar.arrays[0].values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(ar.matrix("m").expect("present")[(1, 0)], 4.0);
    }

    #[test]
    fn test_missing_and_malformed() {
        let mut ar = ModelArchive::new("test");
        ar.arrays.push(NamedArray {
            name: "bad".into(),
            shape: vec![2, 2],
            values: vec![1.0, 2.0, 3.0],
        });
        assert!(matches!(ar.matrix("absent"), Err(Error::MissingArray(_))));
        assert!(matches!(ar.matrix("bad"), Err(Error::ShapeMismatch { .. })));
        assert!(matches!(ar.vector("bad"), Err(Error::ShapeMismatch { .. })));
        assert!(matches!(ar.scalar("mu"), Err(Error::MissingArray(_))));
        assert!(ar.expect_kind("other").is_err());
    }

    #[test]
    fn test_save_load() {
        let mut ar = ModelArchive::new("test");
        ar.push_vector("v", &array![0.5, -1.25]);
        ar.set_scalar("mu", 3.0);
        let path = std::env::temp_dir().join(format!("lk-latent-archive-{}.json", std::process::id()));
        ar.save(&path).expect("writable temp dir");
        let back = ModelArchive::load(&path).expect("readable archive");
        fs::remove_file(&path).expect("removable temp file");
        assert_eq!(back, ar);
    }
}
