// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Populates a [`DependencyCache`] for a request, then connects a new consumer and re-resolves the
//! same request incrementally, showing the cache pick up the new node without a full re-traversal.

use std::sync::Arc;

use hashbrown::HashMap;
use vdf::{
    DependencyCache, IoSpecs, InputSpec, Mask, MaskedOutput, Network, NodeId, NodeSpec, OutputId,
    OutputSpec, Request,
};

#[derive(Clone, Debug, PartialEq, Eq)]
struct Kind;

impl NodeSpec for Kind {}

fn leaf() -> IoSpecs {
    IoSpecs::new(Vec::new(), vec![OutputSpec::new("out")])
}

fn pass_through() -> IoSpecs {
    IoSpecs::new(vec![InputSpec::new("in")], vec![OutputSpec::new("out")])
}

fn accept_every_node(_node: NodeId, _deps: &HashMap<OutputId, Mask>, _acc: &[NodeId]) -> bool {
    true
}

fn propagate_to_first_output(network: &Network<Kind>, node: NodeId, mask: &Mask) -> HashMap<OutputId, Mask> {
    let out = network.with_node(node, |n| n.outputs().first().map(|o| o.id())).flatten();
    out.map(|id| HashMap::from([(id, mask.clone())])).unwrap_or_default()
}

fn main() {
    let network: Network<Kind> = Network::new();
    let source = network.add_node(Kind, leaf());
    let first = network.add_node(Kind, pass_through());
    network.connect(source, 0, first, "in", Mask::all_set(4), None).unwrap();

    let cache = Arc::new(DependencyCache::<Kind>::new(
        Arc::new(accept_every_node),
        Arc::new(propagate_to_first_output),
    ));
    network.register_monitor(cache.clone());

    let source_output = network.with_node(source, |n| n.outputs()[0].id()).unwrap();
    let request = Request::normalized(vec![MaskedOutput::new(source_output, Mask::all_set(4))]);

    let before = cache.find(&network, request.clone(), true);
    println!("before: {} nodes reached", before.node_deps.len());

    let second = network.add_node(Kind, pass_through());
    network.connect(source, 0, second, "in", Mask::all_set(4), None).unwrap();

    let after = cache.find(&network, request, true);
    println!("after: {} nodes reached", after.node_deps.len());
}
