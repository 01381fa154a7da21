// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two independent speculation points, each closing a cycle that an ordinary node could not.
//! Exercises `Connect`'s cycle bypass and a traverser's own responsibility for not looping
//! forever over a graph that legitimately contains one.

mod common;

use std::collections::HashSet;

use common::Kind as NodeKind;
use vdf::{Mask, MaskedOutput, Network, Request, SparseOutputTraverser};

#[test]
fn speculation_nodes_accept_connections_that_would_otherwise_close_a_cycle() {
    let network: Network<NodeKind> = Network::new();

    let point_a = network.add_node(NodeKind::Speculation, common::specs(&["in"], &["out"]));
    let mid_a = network.add_node(NodeKind::Plain, common::specs(&["in"], &["out"]));
    network
        .connect(point_a, 0, mid_a, "in", Mask::all_set(2), None)
        .expect("forward edge always allowed");
    let closing_a = network.connect(mid_a, 0, point_a, "in", Mask::all_set(2), None);
    assert!(
        closing_a.is_some(),
        "a connection into a speculation node may close a cycle"
    );

    let point_b = network.add_node(NodeKind::Speculation, common::specs(&["in"], &["out"]));
    let mid_b = network.add_node(NodeKind::Plain, common::specs(&["in"], &["out"]));
    network
        .connect(point_b, 0, mid_b, "in", Mask::all_set(2), None)
        .expect("forward edge always allowed");
    let closing_b = network.connect(mid_b, 0, point_b, "in", Mask::all_set(2), None);
    assert!(
        closing_b.is_some(),
        "the second, independent speculation point must behave the same way"
    );

    // An ordinary node refuses the same shape of connection.
    let plain_a = network.add_node(NodeKind::Plain, common::specs(&["in"], &["out"]));
    let plain_b = network.add_node(NodeKind::Plain, common::specs(&["in"], &["out"]));
    network
        .connect(plain_a, 0, plain_b, "in", Mask::all_set(2), None)
        .expect("forward edge always allowed");
    let rejected = network.connect(plain_b, 0, plain_a, "in", Mask::all_set(2), None);
    assert!(
        rejected.is_none(),
        "a non-speculation target must still refuse a cycle-closing connection"
    );

    // Walking downstream from either speculation point visits a real cycle; the traverser relies
    // on the caller's own callback to stop revisiting, not on some internal cycle guard.
    let request = Request::normalized(vec![MaskedOutput::new(
        network.with_node(point_a, |n| n.outputs()[0].id()).unwrap(),
        Mask::all_set(2),
    )]);
    let mut traverser = SparseOutputTraverser::new(&network);
    let mut seen = HashSet::new();
    let mut revisits = 0usize;
    traverser.traverse(&request, |out, _mask, _via| {
        if !seen.insert(out) {
            revisits += 1;
            return false;
        }
        true
    });
    assert!(
        revisits >= 1,
        "downstream of a speculation-closed cycle, the same output must come back around"
    );
    assert!(seen.len() >= 2, "both point_a and mid_a must have been reached");
}
