// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The isolated-subgraph helper: walks upstream from a root node or connection, collecting every
//! node and connection that becomes fully detached from the rest of the network along the way,
//! and defers their removal until explicitly applied (spec §4.7).

use alloc::boxed::Box;
use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};

use crate::network::connection::ConnectionId;
use crate::network::network::Network;
use crate::network::node::{NodeId, NodeSpec};

/// Accumulates an isolated subgraph by walking upstream from seed nodes or connections.
///
/// A node becomes isolated exactly when every connection sourced from one of its outputs has
/// itself been walked into the isolated set — tracked by a per-node "remaining unisolated
/// output-connection count" that starts at the node's total output-connection count and is
/// decremented as each such connection is absorbed. Removal from the network is deferred until
/// [`Self::remove_isolated_objects_from_network`] is called, or until this value is dropped.
pub struct IsolatedSubgraph<'net, S> {
    network: &'net Network<S>,
    can_delete: Box<dyn Fn(NodeId) -> bool + 'net>,
    remaining_output_connections: HashMap<NodeId, usize>,
    isolated_node_set: HashSet<NodeId>,
    isolated_nodes: Vec<NodeId>,
    visited_connections: HashSet<ConnectionId>,
    isolated_connections: Vec<ConnectionId>,
    applied: bool,
}

impl<'net, S> IsolatedSubgraph<'net, S>
where
    S: NodeSpec,
{
    /// Constructs an empty walk over `network`, only ever isolating nodes for which
    /// `can_delete` returns `true`.
    #[must_use]
    pub fn new(network: &'net Network<S>, can_delete: impl Fn(NodeId) -> bool + 'net) -> Self {
        Self {
            network,
            can_delete: Box::new(can_delete),
            remaining_output_connections: HashMap::new(),
            isolated_node_set: HashSet::new(),
            isolated_nodes: Vec::new(),
            visited_connections: HashSet::new(),
            isolated_connections: Vec::new(),
            applied: false,
        }
    }

    /// Seeds the walk with `node` itself, treating it as already isolated (subject to
    /// `can_delete`), then walking upstream through its inputs.
    pub fn isolate_from_node(&mut self, node: NodeId) {
        if !(self.can_delete)(node) || !self.isolated_node_set.insert(node) {
            return;
        }
        self.isolated_nodes.push(node);
        self.walk_inputs(node);
    }

    /// Seeds the walk with `connection`, then attempts to isolate its source node (decrementing
    /// that node's remaining output-connection count).
    pub fn isolate_from_connection(&mut self, connection: ConnectionId) {
        if !self.visited_connections.insert(connection) {
            return;
        }
        let Some(conn) = self.network.connection(connection) else {
            return;
        };
        self.isolated_connections.push(connection);
        self.decrement_and_maybe_isolate(conn.source_node());
    }

    fn remaining_for(&mut self, node: NodeId) -> usize {
        if let Some(&count) = self.remaining_output_connections.get(&node) {
            return count;
        }
        let total = self
            .network
            .with_node(node, |n| {
                n.outputs().iter().map(|o| o.source_connections().len()).sum()
            })
            .unwrap_or(0);
        self.remaining_output_connections.insert(node, total);
        total
    }

    fn decrement_and_maybe_isolate(&mut self, node: NodeId) {
        let remaining = self.remaining_for(node);
        let remaining = remaining.saturating_sub(1);
        self.remaining_output_connections.insert(node, remaining);
        if remaining != 0 {
            return;
        }
        if !(self.can_delete)(node) || !self.isolated_node_set.insert(node) {
            return;
        }
        self.isolated_nodes.push(node);
        self.walk_inputs(node);
    }

    fn walk_inputs(&mut self, node: NodeId) {
        let input_connections: Vec<ConnectionId> = self
            .network
            .with_node(node, |n| {
                n.inputs()
                    .iter()
                    .flat_map(|input| input.connections().iter().copied())
                    .collect()
            })
            .unwrap_or_default();
        for conn_id in input_connections {
            self.isolate_from_connection(conn_id);
        }
    }

    /// Returns the nodes collected so far, in the order they were isolated.
    #[must_use]
    pub fn isolated_nodes(&self) -> &[NodeId] {
        &self.isolated_nodes
    }

    /// Returns the connections collected so far, in the order they were isolated.
    #[must_use]
    pub fn isolated_connections(&self) -> &[ConnectionId] {
        &self.isolated_connections
    }

    /// Removes every collected connection, then every collected node, from the network —
    /// connections first to match the network's own deletion-notice ordering. Safe to call at
    /// most meaningfully once; a second call is a no-op.
    pub fn remove_isolated_objects_from_network(&mut self) {
        if self.applied {
            return;
        }
        for &connection in &self.isolated_connections {
            self.network.disconnect(connection);
        }
        for &node in &self.isolated_nodes {
            self.network.delete(node);
        }
        self.applied = true;
    }
}

impl<S> Drop for IsolatedSubgraph<'_, S> {
    fn drop(&mut self) {
        if !self.applied {
            for &connection in &self.isolated_connections {
                self.network.disconnect(connection);
            }
            for &node in &self.isolated_nodes {
                self.network.delete(node);
            }
            self.applied = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::Mask;
    use crate::spec::{InputSpec, IoSpecs, OutputSpec};

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Kind(&'static str);
    impl NodeSpec for Kind {}

    fn leaf() -> IoSpecs {
        IoSpecs::new(Vec::new(), alloc::vec![OutputSpec::new("out")])
    }

    fn pass_through() -> IoSpecs {
        IoSpecs::new(
            alloc::vec![InputSpec::new("in")],
            alloc::vec![OutputSpec::new("out")],
        )
    }

    #[test]
    fn isolating_a_linear_chain_collects_every_node_and_connection() {
        let net: Network<Kind> = Network::new();
        let a = net.add_node(Kind("a"), leaf());
        let b = net.add_node(Kind("b"), pass_through());
        let c = net.add_node(Kind("c"), pass_through());

        let ab = net.connect(a, 0, b, "in", Mask::all_set(1), None).unwrap();
        let bc = net.connect(b, 0, c, "in", Mask::all_set(1), None).unwrap();

        let mut isolated = IsolatedSubgraph::new(&net, |_| true);
        isolated.isolate_from_connection(bc);
        isolated.isolate_from_connection(ab);

        assert_eq!(isolated.isolated_nodes(), &[b, a]);
        assert!(isolated.isolated_connections().contains(&bc));
        assert!(isolated.isolated_connections().contains(&ab));
    }

    #[test]
    fn a_node_feeding_two_consumers_is_not_isolated_until_both_are_walked() {
        let net: Network<Kind> = Network::new();
        let a = net.add_node(Kind("a"), leaf());
        let b = net.add_node(Kind("b"), pass_through());
        let c = net.add_node(Kind("c"), pass_through());

        let ab = net.connect(a, 0, b, "in", Mask::all_set(1), None).unwrap();
        let ac = net.connect(a, 0, c, "in", Mask::all_set(1), None).unwrap();

        let mut isolated = IsolatedSubgraph::new(&net, |_| true);
        isolated.isolate_from_connection(ab);
        assert!(!isolated.isolated_nodes().contains(&a));

        isolated.isolate_from_connection(ac);
        assert!(isolated.isolated_nodes().contains(&a));
    }

    #[test]
    fn can_delete_filter_blocks_isolation_of_a_protected_node() {
        let net: Network<Kind> = Network::new();
        let a = net.add_node(Kind("a"), leaf());
        let b = net.add_node(Kind("b"), pass_through());
        let ab = net.connect(a, 0, b, "in", Mask::all_set(1), None).unwrap();

        let mut isolated = IsolatedSubgraph::new(&net, |node| node != a);
        isolated.isolate_from_connection(ab);

        assert!(!isolated.isolated_nodes().contains(&a));
    }

    #[test]
    fn remove_isolated_objects_disconnects_and_deletes() {
        let net: Network<Kind> = Network::new();
        let a = net.add_node(Kind("a"), leaf());
        let b = net.add_node(Kind("b"), pass_through());
        let ab = net.connect(a, 0, b, "in", Mask::all_set(1), None).unwrap();

        let mut isolated = IsolatedSubgraph::new(&net, |_| true);
        isolated.isolate_from_connection(ab);
        isolated.remove_isolated_objects_from_network();

        assert!(!net.contains_node(a));
    }
}
