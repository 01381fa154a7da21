// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two schedules registered over overlapping node sets, invalidated by node index. Checks the
//! registry only clears schedules that actually reference the touched node, and that an
//! unregistered schedule stops receiving clears even though its node indices may still be
//! referenced by another live schedule.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use vdf::{Id, Mask, OutputId, Schedule, ScheduleInvalidator};

struct CountingSchedule {
    cleared: AtomicUsize,
}

impl CountingSchedule {
    fn new() -> Self {
        Self {
            cleared: AtomicUsize::new(0),
        }
    }

    fn cleared(&self) -> usize {
        self.cleared.load(Ordering::Acquire)
    }
}

impl Schedule for CountingSchedule {
    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::AcqRel);
    }

    fn update_affects_mask_for_output(&self, _output: OutputId) -> bool {
        false
    }

    fn scheduled_outputs_on_node(&self, _node: vdf::NodeId) -> Vec<OutputId> {
        Vec::new()
    }
}

fn node(index: u32) -> vdf::NodeId {
    Id::from_parts(0, index)
}

fn mask_over(indices: &[usize], size: usize) -> Mask {
    let mut mask = Mask::all_unset(size);
    for &i in indices {
        mask.set(i);
    }
    mask
}

#[test]
fn only_schedules_referencing_the_touched_node_are_cleared() {
    let registry = ScheduleInvalidator::new();

    let first = Arc::new(CountingSchedule::new());
    let second = Arc::new(CountingSchedule::new());
    registry.register(first.clone(), mask_over(&[1, 3, 5], 6));
    let second_token = registry.register(second.clone(), mask_over(&[2, 3, 4], 6));

    registry.invalidate_containing_node(node(0));
    assert_eq!(first.cleared(), 0, "node 0 is in neither schedule's set");
    assert_eq!(second.cleared(), 0);

    registry.invalidate_containing_node(node(1));
    assert_eq!(first.cleared(), 1, "node 1 belongs only to the first schedule");
    assert_eq!(second.cleared(), 0);

    registry.invalidate_containing_node(node(3));
    assert_eq!(first.cleared(), 2, "node 3 is shared; both schedules must clear");
    assert_eq!(second.cleared(), 1);

    registry.invalidate_containing_node(node(4));
    assert_eq!(first.cleared(), 2, "node 4 belongs only to the second schedule");
    assert_eq!(second.cleared(), 2);

    // Unregistering the second schedule must stop it from being cleared even though node 3 is
    // still referenced by the (still-live) first schedule.
    registry.unregister(second_token);
    registry.invalidate_containing_node(node(3));
    assert_eq!(first.cleared(), 3);
    assert_eq!(second.cleared(), 2, "an unregistered schedule must never be cleared again");

    assert_eq!(registry.len(), 1);
    assert!(!registry.is_empty());
}

#[test]
fn invalidate_all_clears_every_still_registered_schedule_regardless_of_node_set() {
    let registry = ScheduleInvalidator::new();
    let a = Arc::new(CountingSchedule::new());
    let b = Arc::new(CountingSchedule::new());
    registry.register(a.clone(), Mask::all_unset(4));
    registry.register(b.clone(), Mask::all_unset(4));

    registry.invalidate_all();
    assert_eq!(a.cleared(), 1);
    assert_eq!(b.cleared(), 1);
}
