// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2026 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Thread pool setup for batch scoring.

use log::*;
use rayon::{current_num_threads, ThreadPoolBuilder};

use crate::errors::{Error, Result};

/// Initialize the global thread pool.  Can only succeed once per process.
pub fn init_pool(n_threads: usize) -> Result<()> {
    debug!("initializing scoring thread pool with {} threads", n_threads);
    ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
        .map_err(|e| Error::InvalidConfig(format!("thread pool: {}", e)))
}

pub fn thread_count() -> usize {
    current_num_threads()
}

#[test]
fn test_thread_count() {
    assert!(thread_count() >= 1);
}
