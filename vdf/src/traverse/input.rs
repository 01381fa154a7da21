// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sparse output-to-input traversal.
//!
//! Grounded on `sparseInputTraverser.cpp` (scalar) and `sparseVectorizedInputTraverser.cpp`
//! (vectorized): from a set of masked outputs, walk upstream along connections, pruning branches
//! whose mask has already been visited and deferring pool-output work into a priority queue keyed
//! by pool-chain index (spec §4.3).

use alloc::collections::BinaryHeap;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::mask::Mask;
use crate::network::connection::ConnectionId;
use crate::network::network::Network;
use crate::network::node::{NodeId, NodeSpec};
use crate::poolchain::PoolChainIndex;
use crate::request::Request;

/// Controls which nodes the node callback fires for during a traversal.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CallbackMode {
    /// Invoke the node callback for every node visited.
    AllNodes,
    /// Invoke the node callback only for nodes with no further upstream connections to walk.
    TerminalNodes,
}

struct PoolFrame {
    index: PoolChainIndex,
    connection: ConnectionId,
    mask: Mask,
    path: Vec<ConnectionId>,
}

impl PartialEq for PoolFrame {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}
impl Eq for PoolFrame {}
impl PartialOrd for PoolFrame {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PoolFrame {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        // A plain max-heap already gives "furthest downstream (largest rank) first" — no
        // `Reverse` wrapper needed (spec §4.3.E).
        self.index.cmp(&other.index)
    }
}

struct WorkFrame {
    connection: ConnectionId,
    mask: Mask,
    path: Vec<ConnectionId>,
}

/// Walks upstream from a set of masked outputs, visiting every node that contributes to any
/// visited mask.
pub struct SparseInputTraverser<'net, S> {
    network: &'net Network<S>,
}

impl<'net, S> SparseInputTraverser<'net, S>
where
    S: NodeSpec,
{
    /// Constructs a traverser bound to `network`.
    #[must_use]
    pub const fn new(network: &'net Network<S>) -> Self {
        Self { network }
    }

    /// Traverses upstream from `request`. `node_callback` is invoked per visited node (mode
    /// permitting); returning `false` halts only the current branch. `connection_callback`, if
    /// provided, is invoked once per traversed connection with the mask that flowed through it.
    pub fn traverse(
        &self,
        request: &Request,
        mode: CallbackMode,
        mut node_callback: impl FnMut(NodeId, &[ConnectionId]) -> bool,
        mut connection_callback: impl FnMut(ConnectionId, &Mask, &[ConnectionId]) -> bool,
    ) {
        let mut visited: HashMap<ConnectionId, Mask> = HashMap::new();
        let mut stack: Vec<WorkFrame> = Vec::new();
        let mut pool_queue: BinaryHeap<PoolFrame> = BinaryHeap::new();

        for entry in request {
            for connection in self.connections_feeding(entry.output) {
                let next_mask = connection.mask().intersection(&entry.mask);
                if next_mask.is_all_unset() {
                    continue;
                }
                let index = self.network.poolchain().index_of(entry.output);
                if index.is_valid() {
                    pool_queue.push(PoolFrame {
                        index,
                        connection: connection.id(),
                        mask: next_mask,
                        path: Vec::new(),
                    });
                } else {
                    stack.push(WorkFrame {
                        connection: connection.id(),
                        mask: next_mask,
                        path: Vec::new(),
                    });
                }
            }
        }

        loop {
            while let Some(frame) = stack.pop() {
                self.visit_connection(
                    frame,
                    mode,
                    &mut node_callback,
                    &mut connection_callback,
                    &mut visited,
                    &mut stack,
                    &mut pool_queue,
                );
            }

            let Some(pool_frame) = pool_queue.pop() else {
                break;
            };
            self.visit_connection(
                WorkFrame {
                    connection: pool_frame.connection,
                    mask: pool_frame.mask,
                    path: pool_frame.path,
                },
                mode,
                &mut node_callback,
                &mut connection_callback,
                &mut visited,
                &mut stack,
                &mut pool_queue,
            );
        }
    }

    /// Returns every connection whose source output is `output`, found by scanning the live node
    /// array. Outputs do not carry a back-pointer to their owning node in this facade, so seeding
    /// a traversal from a raw [`crate::request::OutputId`] goes through this linear scan; once a
    /// traversal is underway, `Output::source_connections` gives direct access without scanning.
    fn connections_feeding(
        &self,
        output: crate::request::OutputId,
    ) -> Vec<crate::network::connection::Connection> {
        let mut found = Vec::new();
        self.network.for_each_node(|node| {
            for out in node.outputs() {
                if out.id() == output {
                    for &conn_id in out.source_connections() {
                        if let Some(conn) = self.network.connection(conn_id) {
                            found.push(conn);
                        }
                    }
                }
            }
        });
        found
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_connection(
        &self,
        frame: WorkFrame,
        mode: CallbackMode,
        node_callback: &mut impl FnMut(NodeId, &[ConnectionId]) -> bool,
        connection_callback: &mut impl FnMut(ConnectionId, &Mask, &[ConnectionId]) -> bool,
        visited: &mut HashMap<ConnectionId, Mask>,
        stack: &mut Vec<WorkFrame>,
        pool_queue: &mut BinaryHeap<PoolFrame>,
    ) {
        let already = visited
            .get(&frame.connection)
            .is_some_and(|acc| acc.contains(&frame.mask));
        if already {
            return;
        }
        visited
            .entry(frame.connection)
            .and_modify(|acc| acc.union_with(&frame.mask))
            .or_insert_with(|| frame.mask.clone());

        if !connection_callback(frame.connection, &frame.mask, &frame.path) {
            return;
        }

        let Some(connection) = self.network.connection(frame.connection) else {
            return;
        };
        let source_node = connection.source_node();

        let mut next_path = frame.path.clone();
        next_path.push(frame.connection);

        let is_terminal = self
            .network
            .with_node(source_node, |node| {
                node.outputs()
                    .iter()
                    .all(|o| o.source_connections().is_empty())
            })
            .unwrap_or(true);

        let should_callback = match mode {
            CallbackMode::AllNodes => true,
            CallbackMode::TerminalNodes => is_terminal,
        };
        if should_callback && !node_callback(source_node, &next_path) {
            return;
        }

        self.network.with_node(source_node, |node| {
            for output in node.outputs() {
                if let Some(affects) = output.affects_mask() {
                    if !affects.overlaps(&frame.mask) {
                        continue;
                    }
                }
                for &upstream_connection in output.source_connections() {
                    let Some(upstream) = self.network.connection(upstream_connection) else {
                        continue;
                    };
                    let next_mask = upstream.mask().intersection(&frame.mask);
                    if next_mask.is_all_unset() {
                        continue;
                    }
                    let index = self.network.poolchain().index_of(output.id());
                    if index.is_valid() {
                        pool_queue.push(PoolFrame {
                            index,
                            connection: upstream_connection,
                            mask: next_mask,
                            path: next_path.clone(),
                        });
                    } else {
                        stack.push(WorkFrame {
                            connection: upstream_connection,
                            mask: next_mask,
                            path: next_path.clone(),
                        });
                    }
                }
            }
        });
    }
}

/// A bitset over request indices, used by the vectorized input traverser to track which of the
/// `k` seed requests a given connection's visit originated from.
pub type RequestBits = Mask;

struct VectorizedWorkFrame {
    connection: ConnectionId,
    mask: Mask,
    request_bits: RequestBits,
}

struct VectorizedPoolFrame {
    index: PoolChainIndex,
    frame: VectorizedWorkFrame,
}

impl PartialEq for VectorizedPoolFrame {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}
impl Eq for VectorizedPoolFrame {}
impl PartialOrd for VectorizedPoolFrame {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for VectorizedPoolFrame {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

/// The vectorized variant: traverses from a list of `k` requests at once, tracking per-connection
/// which subset of requests reached it so identical upstream work is shared (spec §4.3).
pub struct SparseVectorizedInputTraverser<'net, S> {
    network: &'net Network<S>,
}

impl<'net, S> SparseVectorizedInputTraverser<'net, S>
where
    S: NodeSpec,
{
    /// Constructs a traverser bound to `network`.
    #[must_use]
    pub const fn new(network: &'net Network<S>) -> Self {
        Self { network }
    }

    /// Traverses upstream from `requests`, invoking `node_callback` with the set of request
    /// indices (as a [`RequestBits`] mask of width `requests.len()`) that reached each node.
    pub fn traverse(
        &self,
        requests: &[Request],
        mut node_callback: impl FnMut(NodeId, &RequestBits) -> bool,
    ) {
        let k = requests.len();
        let mut visited: HashMap<ConnectionId, Vec<(Mask, RequestBits)>> = HashMap::new();
        let mut stack: Vec<VectorizedWorkFrame> = Vec::new();
        let mut pool_queue: BinaryHeap<VectorizedPoolFrame> = BinaryHeap::new();

        for (i, request) in requests.iter().enumerate() {
            for entry in request {
                let mut bits = RequestBits::all_unset(k);
                bits.set(i);
                self.fan_out_from_output(
                    entry.output,
                    &entry.mask,
                    &bits,
                    &mut stack,
                    &mut pool_queue,
                );
            }
        }

        loop {
            while let Some(frame) = stack.pop() {
                self.visit(
                    frame,
                    &mut node_callback,
                    &mut visited,
                    &mut stack,
                    &mut pool_queue,
                );
            }
            let Some(VectorizedPoolFrame { frame, .. }) = pool_queue.pop() else {
                break;
            };
            self.visit(
                frame,
                &mut node_callback,
                &mut visited,
                &mut stack,
                &mut pool_queue,
            );
        }
    }

    fn fan_out_from_output(
        &self,
        output: crate::request::OutputId,
        mask: &Mask,
        bits: &RequestBits,
        stack: &mut Vec<VectorizedWorkFrame>,
        pool_queue: &mut BinaryHeap<VectorizedPoolFrame>,
    ) {
        // Outputs are resolved to their owning node's source connections by the network; since
        // the facade here only knows the output id, each connection below carries its own
        // terminus check through `Network::connection`.
        for entry in self.network_connections_for(output) {
            let next_mask = entry.mask().intersection(mask);
            if next_mask.is_all_unset() {
                continue;
            }
            let index = self.network.poolchain().index_of(output);
            let frame = VectorizedWorkFrame {
                connection: entry.id(),
                mask: next_mask,
                request_bits: bits.clone(),
            };
            if index.is_valid() {
                pool_queue.push(VectorizedPoolFrame { index, frame });
            } else {
                stack.push(frame);
            }
        }
    }

    fn network_connections_for(
        &self,
        output: crate::request::OutputId,
    ) -> Vec<crate::network::connection::Connection> {
        let mut found = Vec::new();
        self.network.for_each_node(|node| {
            for out in node.outputs() {
                if out.id() == output {
                    for &conn_id in out.source_connections() {
                        if let Some(conn) = self.network.connection(conn_id) {
                            found.push(conn);
                        }
                    }
                }
            }
        });
        found
    }

    fn visit(
        &self,
        frame: VectorizedWorkFrame,
        node_callback: &mut impl FnMut(NodeId, &RequestBits) -> bool,
        visited: &mut HashMap<ConnectionId, Vec<(Mask, RequestBits)>>,
        stack: &mut Vec<VectorizedWorkFrame>,
        pool_queue: &mut BinaryHeap<VectorizedPoolFrame>,
    ) {
        let entries = visited.entry(frame.connection).or_default();
        let fully_contained = entries.iter().any(|(existing_mask, existing_bits)| {
            existing_mask.contains(&frame.mask) && existing_bits.contains(&frame.request_bits)
        });
        if fully_contained {
            return;
        }

        // Not a full prune: either a genuinely new (mask, bits) pair or a partial overlap with an
        // existing one. Either way the connection must still be walked again — merging state into
        // an overlapping entry only avoids unbounded entry growth, it doesn't mean the work was
        // already done (matching the scalar traverser's `visit_connection`, which only skips the
        // callback/upstream step on full containment).
        let mut merged = false;
        for (existing_mask, existing_bits) in entries.iter_mut() {
            if existing_mask.contains(&frame.mask) || frame.mask.contains(existing_mask) {
                existing_mask.union_with(&frame.mask);
                existing_bits.union_with(&frame.request_bits);
                merged = true;
                break;
            }
        }
        if !merged {
            entries.push((frame.mask.clone(), frame.request_bits.clone()));
        }

        let Some(connection) = self.network.connection(frame.connection) else {
            return;
        };
        let source_node = connection.source_node();
        if !node_callback(source_node, &frame.request_bits) {
            return;
        }

        self.network.with_node(source_node, |node| {
            for output in node.outputs() {
                if let Some(affects) = output.affects_mask() {
                    if !affects.overlaps(&frame.mask) {
                        continue;
                    }
                }
                for &upstream_connection in output.source_connections() {
                    let Some(upstream) = self.network.connection(upstream_connection) else {
                        continue;
                    };
                    let next_mask = upstream.mask().intersection(&frame.mask);
                    if next_mask.is_all_unset() {
                        continue;
                    }
                    let index = self.network.poolchain().index_of(output.id());
                    let next_frame = VectorizedWorkFrame {
                        connection: upstream_connection,
                        mask: next_mask,
                        request_bits: frame.request_bits.clone(),
                    };
                    if index.is_valid() {
                        pool_queue.push(VectorizedPoolFrame {
                            index,
                            frame: next_frame,
                        });
                    } else {
                        stack.push(next_frame);
                    }
                }
            }
        });
    }
}
