// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disconnects one arm of an adder, isolates and removes the orphaned chain behind it, then
//! rewires a replacement arm and checks the result resolves against the new topology.

mod common;

use std::collections::HashMap;

use common::Kind as NodeKind;
use vdf::{IsolatedSubgraph, Mask, Network, NodeId};

type Vec3 = (f64, f64, f64);

fn add(a: Vec3, b: Vec3) -> Vec3 {
    (a.0 + b.0, a.1 + b.1, a.2 + b.2)
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Generate(Vec3),
    Translate(Vec3),
    Add,
}

fn compute(network: &Network<NodeKind>, ops: &HashMap<NodeId, Op>, node: NodeId, memo: &mut HashMap<NodeId, Vec3>) -> Vec3 {
    if let Some(v) = memo.get(&node) {
        return *v;
    }
    let conns = network
        .with_node(node, |n| {
            n.inputs()
                .iter()
                .map(|i| i.connections().first().copied())
                .collect::<Vec<_>>()
        })
        .unwrap();
    let value = match ops[&node] {
        Op::Generate(v) => v,
        Op::Translate(step) => {
            let conn = network.connection(conns[0].unwrap()).unwrap();
            add(compute(network, ops, conn.source_node(), memo), step)
        }
        Op::Add => {
            let a = network.connection(conns[0].unwrap()).unwrap().source_node();
            let b = network.connection(conns[1].unwrap()).unwrap().source_node();
            add(
                compute(network, ops, a, memo),
                compute(network, ops, b, memo),
            )
        }
    };
    memo.insert(node, value);
    value
}

const NUM_TRANSLATES: usize = 50;

fn build_chain(network: &Network<NodeKind>, ops: &mut HashMap<NodeId, Op>, axis: Vec3) -> NodeId {
    let generator = network.add_node(NodeKind::Plain, common::specs(&[], &["out"]));
    ops.insert(generator, Op::Generate((0.0, 0.0, 0.0)));
    let step = (
        axis.0 / NUM_TRANSLATES as f64,
        axis.1 / NUM_TRANSLATES as f64,
        axis.2 / NUM_TRANSLATES as f64,
    );
    let mut prev = generator;
    for _ in 0..NUM_TRANSLATES {
        let next = network.add_node(NodeKind::Plain, common::specs(&["in"], &["out"]));
        network
            .connect(prev, 0, next, "in", Mask::all_set(3), None)
            .unwrap();
        ops.insert(next, Op::Translate(step));
        prev = next;
    }
    prev
}

#[test]
fn orphaned_chain_is_isolated_and_a_replacement_resolves_cleanly() {
    let network: Network<NodeKind> = Network::new();
    let mut ops = HashMap::new();

    let chain1 = build_chain(&network, &mut ops, (1.0, 0.0, 0.0));
    let chain2 = build_chain(&network, &mut ops, (0.0, 1.0, 0.0));

    let add_node = network.add_node(NodeKind::Plain, common::specs(&["a", "b"], &["out"]));
    ops.insert(add_node, Op::Add);
    network
        .connect(chain1, 0, add_node, "a", Mask::all_set(3), None)
        .unwrap();
    let chain2_connection = network
        .connect(chain2, 0, add_node, "b", Mask::all_set(3), None)
        .unwrap();

    let before_count = network.node_capacity();

    network.disconnect(chain2_connection);
    let mut isolated = IsolatedSubgraph::new(&network, |_| true);
    isolated.isolate_from_node(chain2);
    isolated.remove_isolated_objects_from_network();

    // Every node in chain2 (the generator plus NUM_TRANSLATES translate nodes) must have been
    // collected and removed — nothing else.
    assert_eq!(isolated.isolated_nodes().len(), NUM_TRANSLATES + 1);
    for node in isolated.isolated_nodes() {
        assert!(!network.contains_node(*node));
    }
    assert!(network.contains_node(chain1));
    assert!(network.contains_node(add_node));
    assert_eq!(
        network.node_capacity(),
        before_count,
        "node_capacity tracks the slot table, not the live count; removed slots stay allocated"
    );

    let replacement = build_chain(&network, &mut ops, (3.0, 0.0, 0.0));
    network
        .connect(replacement, 0, add_node, "b", Mask::all_set(3), None)
        .unwrap();

    let mut memo = HashMap::new();
    let result = compute(&network, &ops, add_node, &mut memo);
    assert_eq!(result, (4.0, 0.0, 0.0));
}
