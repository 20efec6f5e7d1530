// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Learning rate schedules.

use log::*;

use crate::config::ScheduleConfig;

const BOLD_SHRINK: f32 = 0.5;
const BOLD_GROW: f32 = 1.05;

/// The shared learning rate, updated between passes.
#[derive(Debug, Clone)]
pub struct LearnRate {
    current: f32,
    decay: f32,
    bold_driver: bool,
    last_loss: Option<f64>,
}

impl LearnRate {
    pub fn new(initial: f32, config: &ScheduleConfig) -> LearnRate {
        LearnRate {
            current: initial,
            decay: config.decay,
            bold_driver: config.bold_driver,
            last_loss: None,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    /// Adjust the rate after a pass with the given training loss.
    ///
    /// The bold driver shrinks the rate when the loss went up and grows it
    /// when the loss went down; geometric decay is applied after that.
    pub fn end_pass(&mut self, loss: f64) {
        if self.bold_driver {
            if let Some(last) = self.last_loss {
                if loss > last {
                    self.current *= BOLD_SHRINK;
                } else if loss < last {
                    self.current *= BOLD_GROW;
                }
            }
            self.last_loss = Some(loss);
        }
        self.current *= self.decay;
        trace!("learning rate now {}", self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometric_decay() {
        let cfg = ScheduleConfig {
            decay: 0.5,
            bold_driver: false,
        };
        let mut lr = LearnRate::new(0.1, &cfg);
        lr.end_pass(3.0);
        lr.end_pass(2.0);
        assert!((lr.current() - 0.025).abs() < 1e-7);
    }

    #[test]
    fn test_bold_driver() {
        let cfg = ScheduleConfig {
            decay: 1.0,
            bold_driver: true,
        };
        let mut lr = LearnRate::new(0.1, &cfg);
        lr.end_pass(3.0);
        assert_eq!(lr.current(), 0.1);
        lr.end_pass(2.0);
        assert!((lr.current() - 0.105).abs() < 1e-7);
        lr.end_pass(2.5);
        assert!((lr.current() - 0.0525).abs() < 1e-7);
    }
}
