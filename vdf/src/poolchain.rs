// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pool-chain indexing: a dynamic topological order over the DAG of read-write ("pool") outputs.
//!
//! Grounded on `poolChainIndex.h` (the packed comparison key) and `poolChainIndexer.h` (insert/
//! remove against a dynamic topological sorter); the sorter itself is a from-scratch two-sided
//! Pearce–Kelly style incremental algorithm, since the upstream `VdfDynamicTopologicalSorter`'s
//! source was not available to copy from (spec §4.5).

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::request::OutputId;

const RANK_BITS: u32 = 32;

/// An opaque, totally ordered position of a pool output within its chain.
///
/// Packs `(rank + 1)` into the upper 32 bits and the output's raw id into the lower bits, so the
/// distinguished [`PoolChainIndex::INVALID`] sentinel (rank encoded as `0`) always sorts smallest
/// regardless of output identity (spec §4.5).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PoolChainIndex(u64);

impl PoolChainIndex {
    /// The sentinel returned for outputs that are not part of any pool chain.
    pub const INVALID: Self = Self(0);

    fn from_rank(rank: u32, output: OutputId) -> Self {
        let packed_output = output.as_u64() & ((1u64 << RANK_BITS) - 1);
        Self((((rank as u64) + 1) << RANK_BITS) | packed_output)
    }

    /// Returns `true` if this index refers to an actual position in a pool chain.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl core::fmt::Debug for PoolChainIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_valid() {
            write!(f, "PoolChainIndex(rank={})", (self.0 >> RANK_BITS) - 1)
        } else {
            write!(f, "PoolChainIndex(invalid)")
        }
    }
}

/// An edge in the pool-chain DAG: `from` (the upstream output feeding a read-write input) must be
/// ranked before `to` (that input's node's associated output).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PoolEdge {
    /// The upstream output.
    pub from: OutputId,
    /// The downstream (associated) output that must rank after `from`.
    pub to: OutputId,
}

#[derive(Default)]
struct Sorter {
    rank: HashMap<OutputId, u32>,
    out_edges: HashMap<OutputId, Vec<OutputId>>,
    in_edges: HashMap<OutputId, Vec<OutputId>>,
    next_rank: u32,
}

impl Sorter {
    fn rank_of(&mut self, output: OutputId) -> u32 {
        *self.rank.entry(output).or_insert_with(|| {
            let r = self.next_rank;
            self.next_rank += 1;
            r
        })
    }

    fn insert_edge(&mut self, edge: PoolEdge) {
        let from_rank = self.rank_of(edge.from);
        let to_rank = self.rank_of(edge.to);

        self.out_edges.entry(edge.from).or_default().push(edge.to);
        self.in_edges.entry(edge.to).or_default().push(edge.from);

        if from_rank < to_rank {
            // Already consistent with a topological order; no resort needed.
            return;
        }

        self.reorder_affected_region(edge.from, edge.to);
    }

    /// Reorders the region between `from` and `to`'s ranks after an edge `from -> to` is added
    /// with `rank(from) >= rank(to)`.
    ///
    /// Follows Pearce & Kelly's two-sided incremental algorithm: collect the forward-affected set
    /// (descendants of `to` ranked no higher than `from`) and the backward-affected set
    /// (ancestors of `from` ranked no lower than `to`), then reassign the ranks occupied by their
    /// union, backward-set first, preserving each set's internal relative order.
    fn reorder_affected_region(&mut self, from: OutputId, to: OutputId) {
        let ub = self.rank[&from];
        let lb = self.rank[&to];

        let forward = Self::collect_bounded(&self.out_edges, to, |r| r <= ub, &self.rank);
        let backward = Self::collect_bounded(&self.in_edges, from, |r| r >= lb, &self.rank);

        let mut affected_ranks: Vec<u32> = forward
            .iter()
            .chain(backward.iter())
            .map(|o| self.rank[o])
            .collect();
        affected_ranks.sort_unstable();

        // Backward-affected vertices must keep preceding forward-affected ones; within each set,
        // preserve the relative order they already had.
        let mut ordered_backward: Vec<OutputId> = backward.into_iter().collect();
        ordered_backward.sort_by_key(|o| self.rank[o]);
        let mut ordered_forward: Vec<OutputId> = forward.into_iter().collect();
        ordered_forward.sort_by_key(|o| self.rank[o]);

        for (output, new_rank) in ordered_backward
            .into_iter()
            .chain(ordered_forward)
            .zip(affected_ranks.drain(..))
        {
            self.rank.insert(output, new_rank);
        }
    }

    fn collect_bounded(
        edges: &HashMap<OutputId, Vec<OutputId>>,
        start: OutputId,
        within_bound: impl Fn(u32) -> bool,
        rank: &HashMap<OutputId, u32>,
    ) -> BTreeSet<OutputId> {
        let mut visited = BTreeSet::new();
        let mut stack = alloc::vec![start];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(neighbors) = edges.get(&current) {
                for &next in neighbors {
                    let r = rank.get(&next).copied().unwrap_or(0);
                    if within_bound(r) {
                        stack.push(next);
                    }
                }
            }
        }
        visited
    }

    fn remove_edge(&mut self, edge: PoolEdge) {
        if let Some(out) = self.out_edges.get_mut(&edge.from) {
            out.retain(|&o| o != edge.to);
        }
        if let Some(inn) = self.in_edges.get_mut(&edge.to) {
            inn.retain(|&o| o != edge.from);
        }
        // Removing an edge never violates an existing topological order, so ranks are left as-is.
    }

    fn clear(&mut self) {
        self.rank.clear();
        self.out_edges.clear();
        self.in_edges.clear();
        self.next_rank = 0;
    }
}

/// Maintains pool-chain ranks for read-write output DAGs and answers [`PoolChainIndex`] queries.
///
/// `insert`/`remove` are thread-safe against each other under one internal lock; `clear` and
/// `index_of` are not (spec §4.5).
#[derive(Default)]
pub struct PoolChainIndexer {
    sorter: Mutex<Sorter>,
}

impl PoolChainIndexer {
    /// Constructs an empty indexer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pool edge. A connection that does not bear on a pool output should pass `None`
    /// here; this call then silently does nothing.
    pub fn insert(&self, edge: Option<PoolEdge>) {
        if let Some(edge) = edge {
            self.sorter.lock().insert_edge(edge);
        }
    }

    /// Unregisters a pool edge. Silently ignores `None`.
    pub fn remove(&self, edge: Option<PoolEdge>) {
        if let Some(edge) = edge {
            self.sorter.lock().remove_edge(edge);
        }
    }

    /// Discards all tracked pool edges and ranks. Not safe to call concurrently with `insert`/
    /// `remove`.
    pub fn clear(&self) {
        self.sorter.lock().clear();
    }

    /// Returns the current pool-chain index for `output`, or [`PoolChainIndex::INVALID`] if it is
    /// not part of any tracked pool chain. Not safe to call concurrently with `insert`/`remove`.
    #[must_use]
    pub fn index_of(&self, output: OutputId) -> PoolChainIndex {
        let sorter = self.sorter.lock();
        sorter
            .rank
            .get(&output)
            .map_or(PoolChainIndex::INVALID, |&rank| {
                PoolChainIndex::from_rank(rank, output)
            })
    }
}

impl core::fmt::Debug for PoolChainIndexer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolChainIndexer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;

    fn out(i: u32) -> OutputId {
        Id::from_parts(0, i)
    }

    #[test]
    fn in_order_insertion_needs_no_reorder() {
        let indexer = PoolChainIndexer::new();
        indexer.insert(Some(PoolEdge {
            from: out(1),
            to: out(2),
        }));
        indexer.insert(Some(PoolEdge {
            from: out(2),
            to: out(3),
        }));
        assert!(indexer.index_of(out(1)) < indexer.index_of(out(2)));
        assert!(indexer.index_of(out(2)) < indexer.index_of(out(3)));
    }

    #[test]
    fn out_of_order_insertion_triggers_reorder() {
        let indexer = PoolChainIndexer::new();
        // Establish 3 before 1 in rank, then add an edge 1 -> 3 that demands 1 precede 3.
        indexer.insert(Some(PoolEdge {
            from: out(3),
            to: out(4),
        }));
        indexer.insert(Some(PoolEdge {
            from: out(1),
            to: out(3),
        }));
        assert!(indexer.index_of(out(1)) < indexer.index_of(out(3)));
        assert!(indexer.index_of(out(3)) < indexer.index_of(out(4)));
    }

    #[test]
    fn unknown_outputs_are_invalid() {
        let indexer = PoolChainIndexer::new();
        assert!(!indexer.index_of(out(99)).is_valid());
    }

    #[test]
    fn none_edges_are_ignored() {
        let indexer = PoolChainIndexer::new();
        indexer.insert(None);
        indexer.remove(None);
        assert!(!indexer.index_of(out(1)).is_valid());
    }

    #[test]
    fn removing_an_edge_keeps_ranks_valid() {
        let indexer = PoolChainIndexer::new();
        let edge = PoolEdge {
            from: out(1),
            to: out(2),
        };
        indexer.insert(Some(edge));
        indexer.remove(Some(edge));
        assert!(indexer.index_of(out(1)) < indexer.index_of(out(2)));
    }
}
