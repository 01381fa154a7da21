// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A vectorized dataflow execution engine core: topology management, sparse affects-aware
//! traversal, an incremental dependency cache, and a pool-chain ordering primitive.
//!
//! Grounded on OpenUSD's `pxr/exec/vdf` and `pxr/exec/ef`: nodes carry named input/output slots
//! with a shared, refcounted shape; connections carry a [`mask::Mask`] selecting which logical
//! indices flow through them; traversal, dependency caching, and schedule invalidation all prune
//! on these masks rather than walking every edge unconditionally.
//!
//! The engine does not know what a node computes. [`network::NodeSpec`] is the only hook a caller
//! implements to plug in a concrete node-kind enum; value storage and node compute are entirely
//! external, reached through the callback- and trait-object-shaped seams in [`depcache`] and
//! [`iter`].
//!
//! Mask/id/request primitives are `alloc`-only; the topology store, pool-chain indexer,
//! dependency cache, and schedule invalidator need real concurrency (`dashmap`, `parking_lot`,
//! `rayon`) and currently require the `std` feature, which is enabled by default.

#![no_std]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod depcache;
pub mod diagnostic;
pub mod id;
pub mod invalidate;
pub mod isolate;
pub mod iter;
pub mod mask;
pub mod network;
pub mod poolchain;
pub mod request;
pub mod spec;
pub mod traverse;

pub use depcache::{DependencyCache, DependencyComputation, DependencyPredicate, DependencyResult};
pub use diagnostic::{Diagnostic, DiagnosticSink, NullDiagnosticSink, TracingDiagnosticSink};
pub use id::{Id, IdGenerator};
pub use invalidate::{RegistrationToken, Schedule, ScheduleInvalidator};
pub use isolate::IsolatedSubgraph;
pub use mask::Mask;
pub use network::{Connection, ConnectionId, EditMonitor, Input, Network, Node, NodeId, NodeSpec, Output, OutputId, Rejected};
pub use poolchain::{PoolChainIndex, PoolChainIndexer, PoolEdge};
pub use request::{MaskedOutput, Request};
pub use spec::{InputSpec, IoSpecs, OutputSpec, SharedSpecs, SpecRegistry};
pub use traverse::{
    CallbackMode, PathId, PathResult, RequestBits, SparseInputTraverser, SparseOutputTraverser,
    SparsePathFinder, SparseVectorizedInputTraverser, DEFAULT_CACHE_CAPACITY,
};
