// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Stochastic gradient training engines.
//!
//! There are two engines: [BprTrainer] for pairwise ranking from implicit
//! feedback, and [RatingTrainer] for pointwise rating error.  Both are
//! configured with capability flags rather than specialized types, and both
//! step one pass at a time so callers can interleave evaluation.

use std::time::Instant;

use log::*;

use crate::progress::{CancelToken, ProgressHandle, TrainingStats};

mod bpr;
mod linear;
mod rating;
mod regularization;
mod schedule;
mod side;

pub use bpr::BprTrainer;
pub use linear::BprLinearTrainer;
pub use rating::{FoldedUser, RatingTrainer, SideInfo};
pub use regularization::Regularizer;
pub use schedule::LearnRate;
pub use side::{AttributeBiasTerms, InteractionTerm, RelationBias};

/// An iterative trainer.
pub trait Trainer {
    /// Run one full pass over the training data, returning its mean loss.
    fn iterate(&mut self) -> f64;

    /// Number of passes run so far.
    fn iterations(&self) -> usize;

    /// Number of gradient steps in each pass.
    fn samples_per_iteration(&self) -> usize;

    /// Current shared learning rate.
    fn learn_rate(&self) -> f32;

    /// Approximate size of the learned parameters, in bytes.
    fn model_bytes(&self) -> usize;

    /// Run `n` passes.
    fn train(&mut self, n: usize) -> TrainingStats {
        self.train_with(n, &CancelToken::default())
    }

    /// Run up to `n` passes, stopping between passes if cancelled.
    fn train_with(&mut self, n: usize, cancel: &CancelToken) -> TrainingStats {
        let start = Instant::now();
        let pb = ProgressHandle::new("training passes", Some(n));
        let mut stats = TrainingStats::default();

        for _ in 0..n {
            if cancel.is_cancelled() {
                info!("training cancelled after {} passes", stats.iterations);
                stats.cancelled = true;
                break;
            }
            let lr = self.learn_rate();
            let loss = self.iterate();
            stats.iterations += 1;
            stats.samples += self.samples_per_iteration();
            stats.last_loss = Some(loss);
            info!(
                "pass {}: loss {:.5}, learning rate {:.5} ({:.2}s)",
                self.iterations(),
                loss,
                lr,
                start.elapsed().as_secs_f64()
            );
            pb.tick();
        }

        stats.elapsed = start.elapsed();
        stats.model_bytes = self.model_bytes();
        stats
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `ln(1 + exp(-x))`, the pairwise loss for a score margin `x`.
pub(crate) fn log_loss(x: f64) -> f64 {
    if x > 0.0 {
        (-x).exp().ln_1p()
    } else {
        -x + x.exp().ln_1p()
    }
}

#[test]
fn test_log_loss_stable() {
    assert!((log_loss(0.0) - 2f64.ln()).abs() < 1e-12);
    assert!(log_loss(800.0) >= 0.0);
    assert!((log_loss(-800.0) - 800.0).abs() < 1e-9);
    assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
}
