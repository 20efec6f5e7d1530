// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Additive side-information terms for rating models.
//!
//! Every term is normalized the same way in the forward pass and in the
//! gradient, so entities with many attributes or relations carry no extra
//! implicit weight.

use log::*;
use ndarray::{Array1, Array2};

use crate::data::{AttributeSpaces, BooleanMatrix, RelationMatrix};
use crate::errors::{Error, Result};
use crate::model::ModelArchive;

/// Mean learned weight over an entity's attributes, summed over spaces.
#[derive(Debug, Clone)]
pub struct AttributeBiasTerms {
    spaces: AttributeSpaces,
    weights: Vec<Array1<f32>>,
}

impl AttributeBiasTerms {
    pub fn new(spaces: AttributeSpaces) -> AttributeBiasTerms {
        let weights = spaces.spaces().map(|s| Array1::zeros(s.n_cols())).collect();
        AttributeBiasTerms { spaces, weights }
    }

    pub fn spaces(&self) -> &AttributeSpaces {
        &self.spaces
    }

    pub fn weights(&self) -> &[Array1<f32>] {
        &self.weights
    }

    pub fn contribution(&self, entity: u32) -> f32 {
        self.spaces
            .spaces()
            .zip(self.weights.iter())
            .map(|(space, w)| {
                let attrs = space.row(entity);
                if attrs.is_empty() {
                    0.0
                } else {
                    attrs.iter().map(|a| w[*a as usize]).sum::<f32>() / attrs.len() as f32
                }
            })
            .sum()
    }

    /// Apply `w += rate·(grad/|A| − reg·w)` to each attribute of the entity.
    pub fn update(&mut self, entity: u32, grad: f32, rate: f32, reg: f32) {
        for (space, w) in self.spaces.spaces().zip(self.weights.iter_mut()) {
            let attrs = space.row(entity);
            if attrs.is_empty() {
                continue;
            }
            let g = grad / attrs.len() as f32;
            for a in attrs {
                let v = w[*a as usize];
                w[*a as usize] = v + rate * (g - reg * v);
            }
        }
    }

    pub fn memory_size(&self) -> usize {
        self.weights.iter().map(|w| w.len() * 4).sum()
    }

    pub fn save(&self, ar: &mut ModelArchive, prefix: &str) {
        for (k, w) in self.weights.iter().enumerate() {
            ar.push_vector(&format!("{}_{}", prefix, k), w);
        }
    }

    pub fn load(&mut self, ar: &ModelArchive, prefix: &str) -> Result<()> {
        let mut loaded = Vec::with_capacity(self.weights.len());
        for (k, w) in self.weights.iter().enumerate() {
            let name = format!("{}_{}", prefix, k);
            let v = ar.vector(&name)?;
            if v.len() != w.len() {
                return Err(Error::shape(name, w.len(), v.len()));
            }
            loaded.push(v);
        }
        self.weights = loaded;
        Ok(())
    }
}

/// Pairwise user-attribute × item-attribute weights.
///
/// For each user attribute space there is one matrix against the primary
/// item attributes.  The contribution of a space is the sum of the weights
/// over all (user attribute, item attribute) pairs, divided by both set sizes.
#[derive(Debug, Clone)]
pub struct InteractionTerm {
    user_spaces: AttributeSpaces,
    item_attributes: BooleanMatrix,
    weights: Vec<Array2<f32>>,
}

impl InteractionTerm {
    pub fn new(user_spaces: AttributeSpaces, item_attributes: BooleanMatrix) -> InteractionTerm {
        let n_item_attrs = item_attributes.n_cols();
        let weights = user_spaces
            .spaces()
            .map(|s| Array2::zeros((s.n_cols(), n_item_attrs)))
            .collect();
        InteractionTerm {
            user_spaces,
            item_attributes,
            weights,
        }
    }

    pub fn contribution(&self, user: u32, item: u32) -> f32 {
        let i_attrs = self.item_attributes.row(item);
        if i_attrs.is_empty() {
            return 0.0;
        }
        let mut total = 0.0;
        for (space, h) in self.user_spaces.spaces().zip(self.weights.iter()) {
            let u_attrs = space.row(user);
            if u_attrs.is_empty() {
                continue;
            }
            let mut sum = 0.0;
            for ua in u_attrs {
                for ia in i_attrs {
                    sum += h[(*ua as usize, *ia as usize)];
                }
            }
            total += sum / (u_attrs.len() * i_attrs.len()) as f32;
        }
        total
    }

    pub fn update(&mut self, user: u32, item: u32, grad: f32, rate: f32, reg: f32) {
        let i_attrs = self.item_attributes.row(item);
        if i_attrs.is_empty() {
            return;
        }
        for (space, h) in self.user_spaces.spaces().zip(self.weights.iter_mut()) {
            let u_attrs = space.row(user);
            if u_attrs.is_empty() {
                continue;
            }
            let g = grad / (u_attrs.len() * i_attrs.len()) as f32;
            for ua in u_attrs {
                for ia in i_attrs {
                    let cell = &mut h[(*ua as usize, *ia as usize)];
                    *cell += rate * (g - reg * *cell);
                }
            }
        }
    }

    pub fn memory_size(&self) -> usize {
        self.weights.iter().map(|h| h.len() * 4).sum()
    }

    pub fn save(&self, ar: &mut ModelArchive) {
        for (k, h) in self.weights.iter().enumerate() {
            ar.push_matrix(&format!("interaction_{}", k), h);
        }
    }

    pub fn load(&mut self, ar: &ModelArchive) -> Result<()> {
        let mut loaded = Vec::with_capacity(self.weights.len());
        for (k, h) in self.weights.iter().enumerate() {
            let name = format!("interaction_{}", k);
            let m = ar.matrix(&name)?;
            if m.dim() != h.dim() {
                return Err(Error::shape(name, h.len(), m.len()));
            }
            loaded.push(m);
        }
        self.weights = loaded;
        Ok(())
    }
}

/// Mean learned bias over the users a user is related to.
#[derive(Debug, Clone)]
pub struct RelationBias {
    relations: RelationMatrix,
    bias: Array1<f32>,
}

impl RelationBias {
    pub fn new(relations: RelationMatrix) -> RelationBias {
        if relations.nnz() == 0 {
            warn!("user relation matrix is empty");
        }
        let bias = Array1::zeros(relations.n_cols().max(relations.n_rows()));
        RelationBias { relations, bias }
    }

    pub fn bias(&self) -> &Array1<f32> {
        &self.bias
    }

    pub fn has_relations(&self, user: u32) -> bool {
        !self.relations.row(user).is_empty()
    }

    pub fn contribution(&self, user: u32) -> f32 {
        let related = self.relations.row(user);
        if related.is_empty() {
            return 0.0;
        }
        related.iter().map(|v| self.bias[*v as usize]).sum::<f32>() / related.len() as f32
    }

    pub fn update(&mut self, user: u32, grad: f32, rate: f32, reg: f32) {
        let related = self.relations.row(user);
        if related.is_empty() {
            return;
        }
        let g = grad / related.len() as f32;
        for v in related {
            let b = self.bias[*v as usize];
            self.bias[*v as usize] = b + rate * (g - reg * b);
        }
    }

    pub fn memory_size(&self) -> usize {
        self.bias.len() * 4
    }

    pub fn save(&self, ar: &mut ModelArchive) {
        ar.push_vector("relation_bias", &self.bias);
    }

    pub fn load(&mut self, ar: &ModelArchive) -> Result<()> {
        let v = ar.vector("relation_bias")?;
        if v.len() != self.bias.len() {
            return Err(Error::shape("relation_bias", self.bias.len(), v.len()));
        }
        self.bias = v;
        Ok(())
    }
}
