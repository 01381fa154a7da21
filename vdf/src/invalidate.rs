// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Schedule invalidation registry.
//!
//! Grounded on `scheduleInvalidator.h`/`.cpp`: schedules register the set of node indices they
//! reference; the registry prefilters candidate invalidation work with a process-wide atomic
//! "node filter" before touching any per-schedule state (spec §4.6).

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::mask::Mask;
use crate::network::connection::Connection;
use crate::network::node::{NodeId, OutputId};

/// A schedule registered with a [`ScheduleInvalidator`].
///
/// The registry holds schedules as trait objects behind `Arc`, mirroring spec §5's "schedules are
/// owned externally; the registry holds only raw pointers and a liveness flag" — `Arc` is the
/// safe-Rust stand-in for that raw pointer.
pub trait Schedule: Send + Sync {
    /// Discards every cached value this schedule holds, forcing a full recompute on next use.
    fn clear(&self);

    /// Updates this schedule's record of `output`'s affects mask. Returns `false` if the schedule
    /// cannot incorporate the change in place and must be cleared instead.
    fn update_affects_mask_for_output(&self, output: OutputId) -> bool;

    /// Returns the outputs on `node` that this schedule has already resolved, for
    /// [`ScheduleInvalidator::update_for_connection_change`] to re-check.
    fn scheduled_outputs_on_node(&self, node: NodeId) -> Vec<OutputId>;
}

/// Cache-line-sized in the original implementation (`static_assert(sizeof(_ScheduleEntry) ==
/// ARCH_CACHE_LINE_SIZE)`); this port keeps the same per-entry lock/flag/bitset shape without
/// asserting a specific layout size.
struct Entry {
    schedule: Arc<dyn Schedule>,
    nodes: Mask,
    alive: AtomicBool,
    lock: Mutex<()>,
}

/// Opaque handle returned by [`ScheduleInvalidator::register`], required to unregister.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RegistrationToken(u64);

/// Tracks every live schedule and the node indices it references, so that a topology edit can
/// cheaply find (and only then lock) the schedules it might affect.
#[derive(Default)]
pub struct ScheduleInvalidator {
    entries: DashMap<u64, Entry>,
    next_token: AtomicU64,
    node_filter: RwLock<Vec<AtomicU32>>,
}

impl ScheduleInvalidator {
    /// Constructs an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_filter_capacity(&self, up_to_index: usize) {
        let needs_growth = {
            let filter = self.node_filter.read();
            filter.len() <= up_to_index
        };
        if needs_growth {
            let mut filter = self.node_filter.write();
            while filter.len() <= up_to_index {
                filter.push(AtomicU32::new(0));
            }
        }
    }

    fn bump_filter(&self, nodes: &Mask, delta: i32) {
        if let Some(max_index) = nodes.set_indices().last() {
            self.ensure_filter_capacity(max_index);
        }
        let filter = self.node_filter.read();
        for index in nodes.set_indices() {
            if let Some(counter) = filter.get(index) {
                if delta >= 0 {
                    counter.fetch_add(delta as u32, Ordering::AcqRel);
                } else {
                    counter.fetch_sub((-delta) as u32, Ordering::AcqRel);
                }
            }
        }
    }

    /// Registers `schedule` as referencing the node indices set in `nodes`. Safe to call
    /// concurrently with other `register`/`unregister` calls, but not with any `invalidate_*` /
    /// `update_for_*` call on the same registry (spec §5).
    pub fn register(&self, schedule: Arc<dyn Schedule>, nodes: Mask) -> RegistrationToken {
        self.bump_filter(&nodes, 1);
        let token = self.next_token.fetch_add(1, Ordering::AcqRel);
        self.entries.insert(
            token,
            Entry {
                schedule,
                nodes,
                alive: AtomicBool::new(true),
                lock: Mutex::new(()),
            },
        );
        RegistrationToken(token)
    }

    /// Unregisters a previously registered schedule: marks it dead via a single atomic exchange
    /// and decrements the node filter for every node index it referenced.
    pub fn unregister(&self, token: RegistrationToken) {
        if let Some((_, entry)) = self.entries.remove(&token.0) {
            entry.alive.swap(false, Ordering::AcqRel);
            self.bump_filter(&entry.nodes, -1);
        }
    }

    /// Marks every registered schedule dead and clears it.
    pub fn invalidate_all(&self) {
        for entry in self.entries.iter() {
            entry.alive.store(false, Ordering::Release);
            let _guard = entry.lock.lock();
            entry.schedule.clear();
        }
    }

    fn node_filter_count(&self, node_index: usize) -> u32 {
        self.node_filter
            .read()
            .get(node_index)
            .map_or(0, |c| c.load(Ordering::Acquire))
    }

    /// Clears every live schedule whose registered node set contains `node`, after a cheap
    /// prefilter check against the process-wide node filter.
    pub fn invalidate_containing_node(&self, node: NodeId) {
        let index = node.index() as usize;
        if self.node_filter_count(index) == 0 {
            return;
        }
        for entry in self.entries.iter() {
            if !entry.nodes.is_set(index) {
                continue;
            }
            let _guard = entry.lock.lock();
            if entry.alive.load(Ordering::Acquire) {
                entry.schedule.clear();
            }
        }
    }

    /// For every live schedule that might reference `output`, invokes
    /// [`Schedule::update_affects_mask_for_output`] under the per-entry lock; if it returns
    /// `false`, the schedule is cleared instead.
    pub fn update_for_affects_mask_change(&self, output_owner: NodeId, output: OutputId) {
        let index = output_owner.index() as usize;
        if self.node_filter_count(index) == 0 {
            return;
        }
        for entry in self.entries.iter() {
            if !entry.nodes.is_set(index) {
                continue;
            }
            let _guard = entry.lock.lock();
            if !entry.alive.load(Ordering::Acquire) {
                continue;
            }
            if !entry.schedule.update_affects_mask_for_output(output) {
                entry.schedule.clear();
            }
        }
    }

    /// For every live schedule referencing the connection's target node, re-derives the node's
    /// input-dependency mask (via the caller-supplied `dependency_mask`) for each output the
    /// schedule already resolved on that node; if any yields a set bit, the schedule is cleared.
    pub fn update_for_connection_change(
        &self,
        connection: &Connection,
        dependency_mask: impl Fn(NodeId, OutputId) -> Mask,
    ) {
        let node = connection.target_node();
        let index = node.index() as usize;
        if self.node_filter_count(index) == 0 {
            return;
        }
        for entry in self.entries.iter() {
            if !entry.nodes.is_set(index) {
                continue;
            }
            let _guard = entry.lock.lock();
            if !entry.alive.load(Ordering::Acquire) {
                continue;
            }
            let outputs = entry.schedule.scheduled_outputs_on_node(node);
            let affected = outputs
                .iter()
                .any(|&output| dependency_mask(node, output).is_any_set());
            if affected {
                entry.schedule.clear();
            }
        }
    }

    /// Returns the number of currently registered entries (live or not yet reaped).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no schedules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl core::fmt::Debug for ScheduleInvalidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScheduleInvalidator")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;
    use alloc::sync::Arc;
    use core::sync::atomic::AtomicUsize;

    struct RecordingSchedule {
        cleared: AtomicUsize,
    }

    impl Schedule for RecordingSchedule {
        fn clear(&self) {
            self.cleared.fetch_add(1, Ordering::AcqRel);
        }

        fn update_affects_mask_for_output(&self, _output: OutputId) -> bool {
            false
        }

        fn scheduled_outputs_on_node(&self, _node: NodeId) -> Vec<OutputId> {
            alloc::vec![Id::from_parts(0, 0)]
        }
    }

    fn node(index: u32) -> NodeId {
        Id::from_parts(0, index)
    }

    #[test]
    fn invalidate_containing_node_clears_only_matching_schedules() {
        let registry = ScheduleInvalidator::new();
        let mut nodes = Mask::all_unset(4);
        nodes.set(1);
        let schedule = Arc::new(RecordingSchedule {
            cleared: AtomicUsize::new(0),
        });
        registry.register(schedule.clone(), nodes);

        registry.invalidate_containing_node(node(2));
        assert_eq!(schedule.cleared.load(Ordering::Acquire), 0);

        registry.invalidate_containing_node(node(1));
        assert_eq!(schedule.cleared.load(Ordering::Acquire), 1);
    }

    #[test]
    fn unregister_stops_further_invalidation() {
        let registry = ScheduleInvalidator::new();
        let mut nodes = Mask::all_unset(4);
        nodes.set(0);
        let schedule = Arc::new(RecordingSchedule {
            cleared: AtomicUsize::new(0),
        });
        let token = registry.register(schedule.clone(), nodes);
        registry.unregister(token);
        registry.invalidate_containing_node(node(0));
        assert_eq!(schedule.cleared.load(Ordering::Acquire), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn invalidate_all_clears_every_live_schedule() {
        let registry = ScheduleInvalidator::new();
        let schedule_a = Arc::new(RecordingSchedule {
            cleared: AtomicUsize::new(0),
        });
        let schedule_b = Arc::new(RecordingSchedule {
            cleared: AtomicUsize::new(0),
        });
        registry.register(schedule_a.clone(), Mask::all_unset(2));
        registry.register(schedule_b.clone(), Mask::all_unset(2));
        registry.invalidate_all();
        assert_eq!(schedule_a.cleared.load(Ordering::Acquire), 1);
        assert_eq!(schedule_b.cleared.load(Ordering::Acquire), 1);
    }
}
