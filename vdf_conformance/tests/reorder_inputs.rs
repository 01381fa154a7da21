// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `reorder_input_connections` against a three-input "combine" node: a valid permutation changes
//! read order, and every invalid permutation is rejected with exactly one diagnostic apiece.

mod common;

use std::sync::Arc;

use common::{Kind as NodeKind, RecordingSink};
use vdf::{Mask, Network};

#[test]
fn valid_permutation_reorders_and_invalid_ones_are_each_rejected_once() {
    let sink = Arc::new(RecordingSink::default());
    let network: Network<NodeKind> = Network::with_diagnostics(sink.clone());

    let a = network.add_node(NodeKind::Plain, common::specs(&[], &["out"]));
    let b = network.add_node(NodeKind::Plain, common::specs(&[], &["out"]));
    let c = network.add_node(NodeKind::Plain, common::specs(&[], &["out"]));
    let combine = network.add_node(NodeKind::Plain, common::specs(&["in"], &["out"]));

    let ca = network.connect(a, 0, combine, "in", Mask::all_set(1), None).unwrap();
    let cb = network.connect(b, 0, combine, "in", Mask::all_set(1), None).unwrap();
    let cc = network.connect(c, 0, combine, "in", Mask::all_set(1), None).unwrap();

    network.reorder_input_connections(combine, "in", &[2, 0, 1]);
    network.with_node(combine, |node| {
        assert_eq!(node.inputs()[0].connections(), &[cc, ca, cb]);
    });
    assert_eq!(sink.count(), 0, "a valid permutation emits no diagnostic");

    network.reorder_input_connections(combine, "in", &[0, 0, 1]);
    assert_eq!(sink.count(), 1, "a repeated index is not a bijection");

    network.reorder_input_connections(combine, "in", &[1, 2]);
    assert_eq!(sink.count(), 2, "a permutation shorter than the input's connection count is rejected");

    network.reorder_input_connections(combine, "in", &[0, 1, 2, 0]);
    assert_eq!(sink.count(), 3, "a permutation longer than the input's connection count is rejected");

    // Every rejection must leave the connection order exactly as the last valid reorder left it.
    network.with_node(combine, |node| {
        assert_eq!(node.inputs()[0].connections(), &[cc, ca, cb]);
    });
}
