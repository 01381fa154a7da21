// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Builds a small diamond-shaped network and traverses downstream from the source, printing every
//! output the engine visits along with the mask it carried.

use vdf::{IoSpecs, InputSpec, Mask, Network, NodeSpec, OutputSpec, Request, MaskedOutput, SparseOutputTraverser};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Kind {
    Source,
    Add,
    Sink,
}

impl NodeSpec for Kind {}

fn leaf() -> IoSpecs {
    IoSpecs::new(Vec::new(), vec![OutputSpec::new("out")])
}

fn binary_op() -> IoSpecs {
    IoSpecs::new(
        vec![InputSpec::new("lhs"), InputSpec::new("rhs")],
        vec![OutputSpec::new("out")],
    )
}

fn sink() -> IoSpecs {
    IoSpecs::new(vec![InputSpec::new("in")], Vec::new())
}

fn main() {
    let network: Network<Kind> = Network::new();

    let source = network.add_node(Kind::Source, leaf());
    let left = network.add_node(Kind::Add, binary_op());
    let right = network.add_node(Kind::Add, binary_op());
    let sink_node = network.add_node(Kind::Sink, sink());

    network.connect(source, 0, left, "lhs", Mask::all_set(3), None).unwrap();
    network.connect(source, 0, left, "rhs", Mask::all_set(3), None).unwrap();
    network.connect(source, 0, right, "lhs", Mask::all_set(3), None).unwrap();
    network.connect(left, 0, sink_node, "in", Mask::all_set(3), None).unwrap();
    network.connect(right, 0, sink_node, "in", Mask::all_set(3), None).unwrap();

    let source_output = network.with_node(source, |n| n.outputs()[0].id()).unwrap();
    let request = Request::normalized(vec![MaskedOutput::new(source_output, Mask::all_set(3))]);

    let mut traverser: SparseOutputTraverser<Kind> = SparseOutputTraverser::new(&network);
    traverser.traverse(&request, |output, mask, via| {
        let owner = network.node_owning_output(output);
        println!(
            "visit output={output:?} owner={owner:?} mask={} via={via:?}",
            mask.to_rle_string()
        );
        true
    });
}
