// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sparse graph traversal: output-to-input, input-to-output, and point-to-point path finding,
//! all honoring affects masks and pool-chain ordering (spec §4.3).

pub mod input;
pub mod output;
pub mod pathfinder;

pub use input::{CallbackMode, RequestBits, SparseInputTraverser, SparseVectorizedInputTraverser};
pub use output::{SparseOutputTraverser, DEFAULT_CACHE_CAPACITY};
pub use pathfinder::{PathId, PathResult, SparsePathFinder};
