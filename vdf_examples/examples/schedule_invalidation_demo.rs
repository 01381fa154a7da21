// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Registers two schedules against disjoint node sets and shows that editing one node only clears
//! the schedule that actually referenced it, thanks to the invalidator's node-filter prefilter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vdf::{IoSpecs, Mask, Network, NodeId, NodeSpec, OutputId, OutputSpec, Schedule};

#[derive(Clone, Debug, PartialEq, Eq)]
struct Kind;

impl NodeSpec for Kind {}

struct CountingSchedule {
    cleared: AtomicUsize,
}

impl Schedule for CountingSchedule {
    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::AcqRel);
    }

    fn update_affects_mask_for_output(&self, _output: OutputId) -> bool {
        false
    }

    fn scheduled_outputs_on_node(&self, _node: NodeId) -> Vec<OutputId> {
        Vec::new()
    }
}

fn leaf() -> IoSpecs {
    IoSpecs::new(Vec::new(), vec![OutputSpec::new("out")])
}

fn main() {
    let network: Network<Kind> = Network::new();
    let a = network.add_node(Kind, leaf());
    let b = network.add_node(Kind, leaf());

    let mut mask_a = Mask::all_unset(8);
    mask_a.set(a.index() as usize);
    let mut mask_b = Mask::all_unset(8);
    mask_b.set(b.index() as usize);

    let schedule_a = Arc::new(CountingSchedule { cleared: AtomicUsize::new(0) });
    let schedule_b = Arc::new(CountingSchedule { cleared: AtomicUsize::new(0) });
    network.invalidator().register(schedule_a.clone(), mask_a);
    network.invalidator().register(schedule_b.clone(), mask_b);

    network.invalidator().invalidate_containing_node(a);

    println!("schedule_a cleared: {}", schedule_a.cleared.load(Ordering::Acquire));
    println!("schedule_b cleared: {}", schedule_b.cleared.load(Ordering::Acquire));
}
