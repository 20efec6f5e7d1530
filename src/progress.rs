// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Progress reporting, cancellation, and training statistics.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use log::*;
use serde::Serialize;

const UPDATE_SECS: f64 = 0.2;

#[derive(Clone, Copy)]
struct UpdateState {
    count: usize,
    time: f64,
    rate: f64,
}

/// Throttled progress reporter writing to the log.
///
/// Updates are emitted at most every 0.2 seconds, regardless of how often
/// the counter is advanced.
pub struct ProgressHandle {
    label: String,
    total: Option<usize>,
    start: Instant,
    count: AtomicUsize,
    last_update: RwLock<Option<UpdateState>>,
}

impl ProgressHandle {
    pub fn new(label: &str, total: Option<usize>) -> Self {
        ProgressHandle {
            label: label.into(),
            total,
            start: Instant::now(),
            count: AtomicUsize::new(0),
            last_update: RwLock::new(None),
        }
    }

    pub fn tick(&self) {
        self.advance(1);
    }

    pub fn advance(&self, n: usize) {
        let count = self.count.fetch_add(n, Ordering::Relaxed) + n;

        let last_update = match self.last_update.read() {
            Ok(lock) => *lock,
            Err(_) => return,
        };

        let thresh = if let Some(lu) = last_update {
            // bail early if the rate estimate says we don't need to update
            let n = (count - lu.count) as f64;
            if n / lu.rate < UPDATE_SECS * 0.95 {
                return;
            }
            lu.time
        } else {
            0.0
        };

        let time = self.start.elapsed().as_secs_f64();
        if time < thresh + UPDATE_SECS {
            return;
        }

        // if someone else is writing, they've handled it
        if let Ok(mut lock) = self.last_update.try_write() {
            *lock = Some(UpdateState {
                count,
                time,
                rate: count as f64 / time,
            });
            self.refresh(count, time);
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    fn refresh(&self, count: usize, time: f64) {
        match self.total {
            Some(total) => debug!("{}: {}/{} ({:.1}s)", self.label, count, total, time),
            None => debug!("{}: {} ({:.1}s)", self.label, count, time),
        }
    }
}

/// Cooperative stop signal, checked between training iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Accumulated statistics for a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingStats {
    pub iterations: usize,
    pub samples: usize,
    pub elapsed: Duration,
    pub model_bytes: usize,
    pub last_loss: Option<f64>,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counts() {
        let pb = ProgressHandle::new("test", Some(100));
        for _ in 0..100 {
            pb.tick();
        }
        pb.advance(5);
        assert_eq!(pb.count(), 105);
    }

    #[test]
    fn test_cancel_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
    }
}
