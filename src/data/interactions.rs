// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! The user-item interaction store.

use log::*;

use crate::errors::{Error, Result};
use crate::sparse::{transpose_structure, COOBuilder, CSRStructure, RowColumnSet, CSR};

/// A single observed interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interaction {
    pub user: u32,
    pub item: u32,
    pub rating: Option<f32>,
}

impl Interaction {
    pub fn implicit(user: u32, item: u32) -> Interaction {
        Interaction {
            user,
            item,
            rating: None,
        }
    }

    pub fn rated(user: u32, item: u32, rating: f32) -> Interaction {
        Interaction {
            user,
            item,
            rating: Some(rating),
        }
    }
}

/// Immutable user-item incidence with both by-user and by-item views.
///
/// The record arrays keep every observation in input order (rating models
/// iterate over them); the incidence views are deduplicated.  Both views always
/// agree on the set of (user, item) pairs.
#[derive(Debug, Clone)]
pub struct Interactions {
    users: Vec<u32>,
    items: Vec<u32>,
    ratings: Option<Vec<f32>>,
    by_user: CSRStructure,
    by_item: CSRStructure,
    pairs: RowColumnSet,
}

impl Interactions {
    /// Build the store from interaction records.
    ///
    /// Either every record carries a rating or none does.
    pub fn from_records<I: IntoIterator<Item = Interaction>>(records: I) -> Result<Interactions> {
        let mut users = Vec::new();
        let mut items = Vec::new();
        let mut ratings = Vec::new();
        let mut rated = None;

        for rec in records {
            let has = rec.rating.is_some();
            match rated {
                None => rated = Some(has),
                Some(r) if r != has => {
                    return Err(Error::InconsistentRecords(format!(
                        "record {} {} a rating, but earlier records {}",
                        users.len(),
                        if has { "has" } else { "lacks" },
                        if r { "do" } else { "do not" }
                    )))
                }
                _ => (),
            }
            users.push(rec.user);
            items.push(rec.item);
            if let Some(r) = rec.rating {
                ratings.push(r);
            }
        }

        let ratings = if rated.unwrap_or(false) {
            Some(ratings)
        } else {
            None
        };
        Ok(Interactions::from_columns(users, items, ratings))
    }

    /// Build an implicit-feedback store from (user, item) pairs.
    pub fn implicit<I: IntoIterator<Item = (u32, u32)>>(pairs: I) -> Interactions {
        let (users, items) = pairs.into_iter().unzip();
        Interactions::from_columns(users, items, None)
    }

    /// Build an explicit-feedback store from (user, item, rating) triples.
    pub fn explicit<I: IntoIterator<Item = (u32, u32, f32)>>(triples: I) -> Interactions {
        let mut users = Vec::new();
        let mut items = Vec::new();
        let mut ratings = Vec::new();
        for (u, i, r) in triples {
            users.push(u);
            items.push(i);
            ratings.push(r);
        }
        Interactions::from_columns(users, items, Some(ratings))
    }

    pub(crate) fn from_columns(
        users: Vec<u32>,
        items: Vec<u32>,
        ratings: Option<Vec<f32>>,
    ) -> Interactions {
        assert_eq!(users.len(), items.len());
        if let Some(r) = &ratings {
            assert_eq!(r.len(), users.len());
        }

        let mut bld = COOBuilder::with_capacity(users.len());
        for (u, i) in users.iter().zip(items.iter()) {
            bld.add_entry(*u, *i);
        }
        let by_user = bld.finish(0, 0);
        let by_item = transpose_structure(&by_user);
        let pairs = RowColumnSet::from_csr(&by_user);
        debug!(
            "indexed {} records ({} unique pairs) for {} users and {} items",
            users.len(),
            pairs.len(),
            by_user.n_rows,
            by_user.n_cols
        );

        Interactions {
            users,
            items,
            ratings,
            by_user,
            by_item,
            pairs,
        }
    }

    /// Grow the ID space so there are at least the given numbers of users and items.
    ///
    /// New users and items have no interactions.
    pub fn with_min_dims(mut self, n_users: usize, n_items: usize) -> Interactions {
        let n_users = n_users.max(self.n_users());
        let n_items = n_items.max(self.n_items());
        self.by_user.extend_rows(n_users);
        self.by_user.n_cols = n_items;
        self.by_item.extend_rows(n_items);
        self.by_item.n_cols = n_users;
        self
    }

    /// Number of user IDs (max user ID + 1).
    pub fn n_users(&self) -> usize {
        self.by_user.n_rows
    }

    /// Number of item IDs (max item ID + 1).
    pub fn n_items(&self) -> usize {
        self.by_user.n_cols
    }

    /// Number of interaction records.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Number of distinct (user, item) pairs.
    pub fn n_pairs(&self) -> usize {
        self.by_user.nnz()
    }

    pub fn user_items(&self, user: u32) -> &[u32] {
        self.by_user.row_cols(user as usize)
    }

    pub fn item_users(&self, item: u32) -> &[u32] {
        self.by_item.row_cols(item as usize)
    }

    pub fn user_count(&self, user: u32) -> usize {
        self.by_user.row_len(user as usize)
    }

    pub fn item_count(&self, item: u32) -> usize {
        self.by_item.row_len(item as usize)
    }

    /// Test whether the user has interacted with the item.
    pub fn contains(&self, user: u32, item: u32) -> bool {
        self.pairs.contains_pair(user, item)
    }

    pub fn users(&self) -> &[u32] {
        &self.users
    }

    pub fn items(&self) -> &[u32] {
        &self.items
    }

    pub fn ratings(&self) -> Option<&[f32]> {
        self.ratings.as_deref()
    }

    pub fn has_ratings(&self) -> bool {
        self.ratings.is_some()
    }

    /// Get the user, item, and rating of a record.
    pub fn record(&self, index: usize) -> Interaction {
        Interaction {
            user: self.users[index],
            item: self.items[index],
            rating: self.ratings.as_ref().map(|r| r[index]),
        }
    }

    /// Mean observed rating, or `None` for implicit data.
    pub fn rating_mean(&self) -> Option<f32> {
        let ratings = self.ratings.as_ref()?;
        if ratings.is_empty() {
            return Some(0.0);
        }
        let sum: f64 = ratings.iter().map(|r| *r as f64).sum();
        Some((sum / ratings.len() as f64) as f32)
    }

    /// Smallest and largest observed rating.
    pub fn rating_range(&self) -> Option<(f32, f32)> {
        let ratings = self.ratings.as_ref()?;
        let mut iter = ratings.iter();
        let first = *iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), r| (lo.min(*r), hi.max(*r))))
    }

    /// Approximate memory used by the store, in bytes.
    pub fn memory_size(&self) -> usize {
        let rec = self.users.len() * 8 + self.ratings.as_ref().map(|r| r.len() * 4).unwrap_or(0);
        let csr = (self.by_user.n_rows + self.by_item.n_rows + 2) * 8 + self.n_pairs() * 8;
        rec + csr + self.pairs.len() * 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Interactions {
        Interactions::implicit(vec![(0, 0), (0, 1), (1, 1), (1, 2), (2, 3)])
    }

    #[test]
    fn test_views_agree() {
        let data = scenario();
        assert_eq!(data.n_users(), 3);
        assert_eq!(data.n_items(), 4);
        assert_eq!(data.n_pairs(), 5);
        for u in 0..data.n_users() as u32 {
            for i in data.user_items(u) {
                assert!(data.item_users(*i).contains(&u));
                assert!(data.contains(u, *i));
            }
        }
        for i in 0..data.n_items() as u32 {
            for u in data.item_users(i) {
                assert!(data.user_items(*u).contains(&i));
            }
        }
    }

    #[test]
    fn test_counts() {
        let data = scenario();
        assert_eq!(data.user_count(0), 2);
        assert_eq!(data.user_count(2), 1);
        assert_eq!(data.item_count(1), 2);
        assert_eq!(data.item_count(3), 1);
        assert_eq!(data.user_count(17), 0);
        assert!(data.user_items(17).is_empty());
    }

    #[test]
    fn test_duplicates_kept_as_records() {
        let data = Interactions::implicit(vec![(0, 0), (0, 0), (1, 0)]);
        assert_eq!(data.len(), 3);
        assert_eq!(data.n_pairs(), 2);
        assert_eq!(data.user_items(0), &[0]);
    }

    #[test]
    fn test_grow_dims() {
        let data = scenario().with_min_dims(5, 6);
        assert_eq!(data.n_users(), 5);
        assert_eq!(data.n_items(), 6);
        assert!(data.user_items(4).is_empty());
        assert!(data.item_users(5).is_empty());
        assert_eq!(data.user_items(1), &[1, 2]);
        assert_eq!(data.item_users(1), &[0, 1]);
    }

    #[test]
    fn test_ratings() {
        let data = Interactions::explicit(vec![(0, 0, 1.0), (1, 1, 5.0), (1, 0, 3.0)]);
        assert!(data.has_ratings());
        assert_eq!(data.rating_mean(), Some(3.0));
        assert_eq!(data.rating_range(), Some((1.0, 5.0)));
        assert_eq!(data.record(1), Interaction::rated(1, 1, 5.0));
    }

    #[test]
    fn test_records_must_agree() {
        let res = Interactions::from_records(vec![
            Interaction::rated(0, 0, 4.0),
            Interaction::implicit(1, 1),
        ]);
        assert!(matches!(res, Err(Error::InconsistentRecords(_))));

        let data = Interactions::from_records(vec![
            Interaction::implicit(0, 0),
            Interaction::implicit(1, 1),
        ])
        .expect("valid records");
        assert!(!data.has_ratings());
        assert_eq!(data.rating_mean(), None);
    }
}
