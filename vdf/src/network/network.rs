// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The topology store: [`Network`], the engine's single source of truth for nodes, connections,
//! and the monotone edit version.
//!
//! Grounded on `pxr/exec/vdf/network.h` and on `execution_graph`'s `ExecutionGraph<H: Host>`
//! (`graph.rs`): `AddNode`/`Connect`/`Disconnect`/`Delete`/`Clear` follow the original's ordering
//! guarantees (spec §5: mutation, then edit-version bump, then monitor dispatch, then pool-chain
//! and schedule-invalidator updates), while the node array uses `parking_lot::RwLock` rather than
//! a TBB concurrent vector (spec §4.1.E).

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::diagnostic::{Diagnostic, DiagnosticSink, TracingDiagnosticSink};
use crate::id::{Id, IdGenerator};
use crate::invalidate::ScheduleInvalidator;
use crate::mask::Mask;
use crate::network::connection::{Connection, ConnectionId};
use crate::network::node::{Input, Node, NodeId, NodeSpec, Output, OutputId};
use crate::poolchain::{PoolChainIndexer, PoolEdge};
use crate::spec::{IoSpecs, SpecRegistry};

/// A pointer-identified observer of topology edits, registered with a [`Network`].
///
/// Every method has an empty default body so an observer only needs to override the
/// notifications it cares about. `WillDelete*` callbacks fire before structural removal;
/// `DidAddNode`/`DidConnect` fire after the object is reachable (spec §4.1's monitor contract).
pub trait EditMonitor<S>: Send + Sync {
    /// Called after `node` has been inserted and is reachable.
    fn did_add_node(&self, #[allow(unused_variables)] network: &Network<S>, node: NodeId) {
        let _ = node;
    }

    /// Called after `connection` has been inserted and is reachable.
    fn did_connect(&self, #[allow(unused_variables)] network: &Network<S>, connection: &Connection) {
        let _ = connection;
    }

    /// Called before `connection` is structurally unlinked.
    fn will_delete_connection(
        &self,
        #[allow(unused_variables)] network: &Network<S>,
        connection: &Connection,
    ) {
        let _ = connection;
    }

    /// Called before `node` is structurally unlinked.
    fn will_delete_node(&self, #[allow(unused_variables)] network: &Network<S>, node: NodeId) {
        let _ = node;
    }

    /// Called before a `Clear` deletes every node. No per-object `WillDelete` calls accompany it.
    fn will_clear(&self, #[allow(unused_variables)] network: &Network<S>) {}
}

struct NodeSlot<S> {
    node: Node<S>,
}

/// An error returned by operations that validate a permutation, a mask, or a name before
/// mutating the topology. Every variant corresponds to a no-op: the network is left unchanged and
/// a matching [`Diagnostic`] has already been emitted.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Rejected;

/// The topology store. Generic over `S`, the user-supplied node-kind tag (spec §9's
/// "tagged-variant over node kinds").
pub struct Network<S> {
    nodes: RwLock<Vec<Option<NodeSlot<S>>>>,
    node_ids: Mutex<IdGenerator>,
    output_ids: Mutex<IdGenerator>,
    connection_ids: Mutex<IdGenerator>,
    connections: DashMap<ConnectionId, Connection>,
    debug_names: DashMap<u32, (u32, Box<dyn Fn() -> String + Send + Sync>)>,
    specs: SpecRegistry,
    poolchain: PoolChainIndexer,
    invalidator: ScheduleInvalidator,
    monitors: RwLock<Vec<MonitorSlot<S>>>,
    edit_version: AtomicU64,
    diagnostics: Arc<dyn DiagnosticSink + Send + Sync>,
}

struct MonitorSlot<S> {
    monitor: Arc<dyn EditMonitor<S>>,
}

impl<S> Network<S>
where
    S: NodeSpec,
{
    /// Constructs an empty network reporting diagnostics through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_diagnostics(Arc::new(TracingDiagnosticSink))
    }

    /// Constructs an empty network reporting diagnostics through `sink`.
    #[must_use]
    pub fn with_diagnostics(sink: Arc<dyn DiagnosticSink + Send + Sync>) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            node_ids: Mutex::new(IdGenerator::new()),
            output_ids: Mutex::new(IdGenerator::new()),
            connection_ids: Mutex::new(IdGenerator::new()),
            connections: DashMap::new(),
            debug_names: DashMap::new(),
            specs: SpecRegistry::new(),
            poolchain: PoolChainIndexer::new(),
            invalidator: ScheduleInvalidator::new(),
            monitors: RwLock::new(Vec::new()),
            edit_version: AtomicU64::new(0),
            diagnostics: sink,
        }
    }

    /// Returns the current monotone edit version.
    #[must_use]
    pub fn edit_version(&self) -> u64 {
        self.edit_version.load(Ordering::Acquire)
    }

    fn bump_edit_version(&self) {
        self.edit_version.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns a reference to the input/output spec registry backing this network's nodes.
    #[must_use]
    pub const fn specs(&self) -> &SpecRegistry {
        &self.specs
    }

    /// Returns a reference to the pool-chain indexer maintained for read-write output DAGs.
    #[must_use]
    pub const fn poolchain(&self) -> &PoolChainIndexer {
        &self.poolchain
    }

    /// Returns a reference to the schedule invalidation registry.
    #[must_use]
    pub const fn invalidator(&self) -> &ScheduleInvalidator {
        &self.invalidator
    }

    /// Registers `monitor`. Double registration (the same `Arc` pointer registered twice) is a
    /// programmer-contract error and is a no-op.
    pub fn register_monitor(&self, monitor: Arc<dyn EditMonitor<S>>) {
        let mut monitors = self.monitors.write();
        if monitors
            .iter()
            .any(|slot| Arc::ptr_eq(&slot.monitor, &monitor))
        {
            self.diagnostics.emit(Diagnostic::programmer_contract(
                "edit monitor registered twice",
            ));
            return;
        }
        monitors.push(MonitorSlot { monitor });
    }

    /// Unregisters a previously registered monitor. A monitor not currently registered is
    /// silently ignored.
    pub fn unregister_monitor(&self, monitor: &Arc<dyn EditMonitor<S>>) {
        self.monitors
            .write()
            .retain(|slot| !Arc::ptr_eq(&slot.monitor, monitor));
    }

    /// Inserts a node of kind `kind` with shape `specs`, assigning it a free (or freshly appended)
    /// id. Safe to call concurrently with other `AddNode`/`Connect` calls (spec §4.1).
    pub fn add_node(&self, kind: S, io_specs: IoSpecs) -> NodeId {
        let shared = self.specs.acquire(io_specs);
        let inputs: Vec<Input> = shared
            .specs()
            .inputs
            .iter()
            .map(|spec| Input {
                connections: Vec::new(),
                associated_output: spec.associated_output,
            })
            .collect();

        let mut output_ids = self.output_ids.lock();
        let outputs: Vec<Output> = shared
            .specs()
            .outputs
            .iter()
            .enumerate()
            .map(|(index, _)| {
                let associated_input = shared
                    .specs()
                    .inputs
                    .iter()
                    .position(|i| i.associated_output == Some(index as u32));
                Output {
                    id: output_ids.alloc(),
                    affects_mask: None,
                    source_connections: Vec::new(),
                    associated_input,
                }
            })
            .collect();
        drop(output_ids);

        let id = self.node_ids.lock().alloc();
        let slot = NodeSlot {
            node: Node {
                id,
                kind,
                specs: shared,
                inputs,
                outputs,
            },
        };

        let mut nodes = self.nodes.write();
        let index = id.index() as usize;
        if index >= nodes.len() {
            nodes.resize_with(index + 1, || None);
        }
        nodes[index] = Some(slot);
        drop(nodes);

        self.bump_edit_version();
        for slot in self.monitors.read().iter() {
            slot.monitor.did_add_node(self, id);
        }
        id
    }

    /// Invokes `f` with the live node at `id`, or returns `None` if the slot is empty or the
    /// generation has moved on.
    pub fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&Node<S>) -> R) -> Option<R> {
        let nodes = self.nodes.read();
        let slot = nodes.get(id.index() as usize)?.as_ref()?;
        if slot.node.id != id {
            return None;
        }
        Some(f(&slot.node))
    }

    /// Returns `true` if `id` currently addresses a live node.
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.with_node(id, |_| ()).is_some()
    }

    /// Returns the number of node-array slots ever allocated (a high-water mark; some may be
    /// tombstoned).
    #[must_use]
    pub fn node_capacity(&self) -> usize {
        self.nodes.read().len()
    }

    /// Invokes `f` with every live node, in node-array order. Used by traversal seeding, which
    /// only has an output id to start from and needs the owning node regardless of its current
    /// generation (unlike [`Self::with_node`], which requires an exact id match).
    pub fn for_each_node(&self, mut f: impl FnMut(&Node<S>)) {
        let nodes = self.nodes.read();
        for slot in nodes.iter().flatten() {
            f(&slot.node);
        }
    }

    /// Returns the node currently owning `output`, if any, by scanning the live node array.
    #[must_use]
    pub fn node_owning_output(&self, output: OutputId) -> Option<NodeId> {
        let nodes = self.nodes.read();
        nodes.iter().flatten().find_map(|slot| {
            slot.node
                .outputs()
                .iter()
                .any(|o| o.id() == output)
                .then_some(slot.node.id)
        })
    }

    /// Looks up a connection by id.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.get(&id).map(|c| c.clone())
    }

    /// Associates a lazily-invoked debug name with `node`. Tolerates tombstones: a name recorded
    /// for an index later reused by a different generation is treated as absent.
    pub fn set_debug_name(&self, node: NodeId, name: impl Fn() -> String + Send + Sync + 'static) {
        self.debug_names
            .insert(node.index(), (node.version(), Box::new(name)));
    }

    /// Returns the debug name for `node`, invoking the stored callback, or `None` if no name was
    /// set or the stored name belongs to a stale generation.
    #[must_use]
    pub fn debug_name(&self, node: NodeId) -> Option<String> {
        let entry = self.debug_names.get(&node.index())?;
        if entry.0 != node.version() {
            return None;
        }
        Some((entry.1)())
    }

    /// Builds the conservative `dependency_mask` closure the schedule invalidator needs to decide
    /// whether a connection change reaches a scheduled output: the owning node's own `affects_mask`
    /// intersected with the connection's mask, or the connection's mask alone when the output
    /// hasn't declared one (`affects_mask() == None` means "always affective", so the whole
    /// connection mask counts as dependency-bearing). `Network` has no node-kind compute knowledge
    /// (spec §9), so unlike the original's `ComputeInputDependencyMask` virtual call this can only
    /// ever over-approximate, never under-approximate, the real dependency.
    fn conservative_dependency_mask<'a>(&'a self, connection_mask: &Mask) -> impl Fn(NodeId, OutputId) -> Mask + 'a {
        let conn_mask = connection_mask.clone();
        move |node: NodeId, output: OutputId| -> Mask {
            self.with_node(node, |n| {
                n.outputs
                    .iter()
                    .find(|o| o.id == output)
                    .and_then(|o| o.affects_mask.clone())
            })
            .flatten()
            .map_or_else(|| conn_mask.clone(), |affects| affects.intersection(&conn_mask))
        }
    }

    /// Sets the affects mask on `node`'s output at `output_index` and notifies the schedule
    /// invalidator, mirroring the original's dedicated `_DidChangeAffectsMask` entry point
    /// (`network.cpp`) rather than folding this into `connect`/`disconnect`. `None` restores
    /// "always affective" (spec §4.3).
    pub fn set_output_affects_mask(&self, node: NodeId, output_index: usize, mask: Option<Mask>) {
        let output_id = {
            let mut nodes = self.nodes.write();
            let Some(Some(slot)) = nodes.get_mut(node.index() as usize) else {
                return;
            };
            let Some(output) = slot.node.outputs.get_mut(output_index) else {
                return;
            };
            output.affects_mask = mask;
            output.id
        };
        self.invalidator.update_for_affects_mask_change(node, output_id);
    }

    fn pool_edge_for_connect(&self, source_output: OutputId, target: NodeId, input_index: usize) -> Option<PoolEdge> {
        self.with_node(target, |node| {
            node.inputs
                .get(input_index)
                .and_then(|input| input.associated_output)
                .and_then(|output_index| node.outputs.get(output_index as usize))
                .map(|associated| PoolEdge {
                    from: source_output,
                    to: associated.id,
                })
        })
        .flatten()
    }

    /// Checks whether connecting `source` (owned by `source_node`) to `target`'s input would
    /// close a cycle, via a bounded forward search from `target`.
    fn would_create_cycle(&self, source_node: NodeId, target: NodeId) -> bool {
        if source_node == target {
            return true;
        }
        let mut stack = alloc::vec![target];
        let mut visited: alloc::collections::BTreeSet<NodeId> = alloc::collections::BTreeSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let reaches_source = self
                .with_node(current, |node| {
                    let mut hits = false;
                    for output in &node.outputs {
                        for conn_id in &output.source_connections {
                            if let Some(conn) = self.connections.get(conn_id) {
                                if conn.target_node() == source_node {
                                    hits = true;
                                } else {
                                    stack.push(conn.target_node());
                                }
                            }
                        }
                    }
                    hits
                })
                .unwrap_or(false);
            if reaches_source {
                return true;
            }
        }
        false
    }

    /// Creates a connection from `source_output` (on `source_node`) into `target_node`'s input
    /// named `input_name`, selecting `mask` of the source's indices. `at_index = None` appends;
    /// refuses (and emits a diagnostic) on an unknown input name, a cycle (unless `target_node`'s
    /// kind is a speculation node), or a read-write target input that already holds a connection.
    /// When `source_output` is itself a pool output, debug builds additionally assert that `mask`
    /// is contained by the sole existing connection into its associated input.
    pub fn connect(
        &self,
        source_node: NodeId,
        source_output_index: usize,
        target_node: NodeId,
        input_name: &str,
        mask: Mask,
        at_index: Option<usize>,
    ) -> Option<ConnectionId> {
        let Some(source_output_id) = self.with_node(source_node, |node| {
            node.outputs.get(source_output_index).map(|o| o.id)
        })
        .flatten() else {
            self.diagnostics.emit(Diagnostic::client_data(
                "connect: source output index out of range",
            ));
            return None;
        };

        let Some(input_index) = self.with_node(target_node, |node| node.specs().specs().input_index(input_name))
            .flatten()
        else {
            self.diagnostics.emit(Diagnostic::client_data(
                "connect: unknown input name on target node",
            ));
            return None;
        };

        let is_speculative = self
            .with_node(target_node, |node| node.kind.is_speculation())
            .unwrap_or(false);
        if !is_speculative && self.would_create_cycle(source_node, target_node) {
            self.diagnostics.emit(Diagnostic::programmer_contract(
                "connect: would introduce a cycle",
            ));
            return None;
        }

        let is_read_write = self
            .with_node(target_node, |node| {
                node.inputs[input_index].associated_output.is_some()
            })
            .unwrap_or(false);
        if is_read_write {
            let existing = self
                .with_node(target_node, |node| node.inputs[input_index].connections.clone())
                .unwrap_or_default();
            if !existing.is_empty() {
                self.diagnostics.emit(Diagnostic::programmer_contract(
                    "connect: read-write input already holds a connection",
                ));
                return None;
            }
        }

        // When `source_output` is itself a pool/read-write output, the data it can forward
        // downstream is bounded by whatever already flows into its own associated input. In debug
        // builds, verify the new mask is contained by that sole existing connection's mask.
        if let Some(associated_input_index) = self
            .with_node(source_node, |node| node.outputs[source_output_index].associated_input)
            .flatten()
        {
            let sole_existing = self
                .with_node(source_node, |node| {
                    let conns = &node.inputs[associated_input_index as usize].connections;
                    (conns.len() == 1).then_some(conns[0])
                })
                .flatten();
            if let Some(existing_id) = sole_existing {
                if let Some(existing) = self.connection(existing_id) {
                    if existing.mask().size() == mask.size() {
                        debug_assert!(
                            existing.mask().contains(&mask),
                            "connect: new mask not contained by the read-write source's existing mask",
                        );
                    }
                }
            }
        }

        let id = self.connection_ids.lock().alloc();
        let connection = Connection {
            id,
            source_node,
            source_output: source_output_index as u32,
            target_node,
            target_input: input_index as u32,
            mask,
        };

        {
            let mut nodes = self.nodes.write();
            if let Some(Some(slot)) = nodes.get_mut(target_node.index() as usize) {
                let input = &mut slot.node.inputs[input_index];
                match at_index {
                    Some(i) if i <= input.connections.len() => input.connections.insert(i, id),
                    _ => input.connections.push(id),
                }
            }
            if let Some(Some(slot)) = nodes.get_mut(source_node.index() as usize) {
                slot.node.outputs[source_output_index]
                    .source_connections
                    .push(id);
            }
        }
        self.connections.insert(id, connection.clone());

        self.bump_edit_version();
        for slot in self.monitors.read().iter() {
            slot.monitor.did_connect(self, &connection);
        }

        let edge = self.pool_edge_for_connect(source_output_id, target_node, input_index);
        self.poolchain.insert(edge);

        self.invalidator.update_for_connection_change(
            &connection,
            self.conservative_dependency_mask(connection.mask()),
        );

        Some(id)
    }

    /// Removes `connection`. Notifies `WillDelete` before unlinking, then updates the pool-chain
    /// indexer and schedule invalidator, then deletes the connection record.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let Some(connection) = self.connections.get(&connection_id).map(|c| c.clone()) else {
            return;
        };

        for slot in self.monitors.read().iter() {
            slot.monitor.will_delete_connection(self, &connection);
        }

        {
            let mut nodes = self.nodes.write();
            if let Some(Some(slot)) = nodes.get_mut(connection.target_node().index() as usize) {
                slot.node.inputs[connection.target_input() as usize]
                    .connections
                    .retain(|&c| c != connection_id);
            }
            if let Some(Some(slot)) = nodes.get_mut(connection.source_node().index() as usize) {
                slot.node.outputs[connection.source_output() as usize]
                    .source_connections
                    .retain(|&c| c != connection_id);
            }
        }

        let source_output_id = self
            .with_node(connection.source_node(), |n| {
                n.outputs[connection.source_output() as usize].id
            });
        if let Some(source_output_id) = source_output_id {
            let edge = self.pool_edge_for_connect(
                source_output_id,
                connection.target_node(),
                connection.target_input() as usize,
            );
            self.poolchain.remove(edge);
        }

        self.invalidator.update_for_connection_change(
            &connection,
            self.conservative_dependency_mask(connection.mask()),
        );

        self.connections.remove(&connection_id);
        self.connection_ids.lock().free(connection_id);
        self.bump_edit_version();
    }

    /// Removes `node`, which must have no remaining input or output connections. Emits a
    /// programmer-contract diagnostic and does nothing otherwise.
    pub fn delete(&self, node: NodeId) {
        let still_connected = self
            .with_node(node, Node::has_any_connection)
            .unwrap_or(true);
        if still_connected {
            self.diagnostics.emit(Diagnostic::programmer_contract(
                "delete: node still has connections",
            ));
            return;
        }

        for slot in self.monitors.read().iter() {
            slot.monitor.will_delete_node(self, node);
        }

        {
            let mut nodes = self.nodes.write();
            if let Some(slot) = nodes.get_mut(node.index() as usize) {
                *slot = None;
            }
        }
        self.node_ids.lock().free(node);
        self.invalidator.invalidate_containing_node(node);
        self.bump_edit_version();
    }

    /// Permutes the connection vector of `node`'s input named `input_name` according to
    /// `new_to_old[new_position] = old_position`. `new_to_old` must be a bijection on
    /// `0..connections.len()`; an invalid permutation is an unrecoverable-invariant diagnostic and
    /// a no-op.
    pub fn reorder_input_connections(&self, node: NodeId, input_name: &str, new_to_old: &[usize]) {
        let Some(input_index) = self
            .with_node(node, |n| n.specs().specs().input_index(input_name))
            .flatten()
        else {
            self.diagnostics.emit(Diagnostic::client_data(
                "reorder_input_connections: unknown input name",
            ));
            return;
        };

        let mut nodes = self.nodes.write();
        let Some(Some(slot)) = nodes.get_mut(node.index() as usize) else {
            return;
        };
        let input = &mut slot.node.inputs[input_index];
        if !Self::is_bijection(new_to_old, input.connections.len()) {
            drop(nodes);
            self.diagnostics.emit(Diagnostic::unrecoverable(
                "reorder_input_connections: permutation is not a bijection",
            ));
            return;
        }

        let reordered = new_to_old.iter().map(|&old| input.connections[old]).collect();
        input.connections = reordered;
    }

    fn is_bijection(new_to_old: &[usize], len: usize) -> bool {
        if new_to_old.len() != len {
            return false;
        }
        let mut seen = alloc::vec![false; len];
        for &old in new_to_old {
            if old >= len || seen[old] {
                return false;
            }
            seen[old] = true;
        }
        true
    }

    /// Deletes every node, rebasing the id floor so newly minted ids never alias anything a
    /// caller may still hold from before the clear.
    pub fn clear(&self) {
        for slot in self.monitors.read().iter() {
            slot.monitor.will_clear(self);
        }

        let max_version = {
            let node_ids = self.node_ids.lock();
            node_ids.max_observed_version()
        };

        {
            let mut nodes = self.nodes.write();
            nodes.clear();
        }
        self.connections.clear();
        self.debug_names.clear();

        let mut node_ids = self.node_ids.lock();
        node_ids.rebase(max_version + 1);
        node_ids.clear();
        drop(node_ids);

        let mut output_ids = self.output_ids.lock();
        let max_output_version = output_ids.max_observed_version();
        output_ids.rebase(max_output_version + 1);
        output_ids.clear();
        drop(output_ids);

        self.poolchain.clear();
        self.invalidator.invalidate_all();
        self.bump_edit_version();
    }
}

impl<S> Default for Network<S>
where
    S: NodeSpec,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> core::fmt::Debug for Network<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Network")
            .field("edit_version", &self.edit_version.load(Ordering::Relaxed))
            .field("node_capacity", &self.nodes.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{InputSpec, OutputSpec};

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Kind(&'static str);

    impl NodeSpec for Kind {}

    fn leaf_specs() -> IoSpecs {
        IoSpecs::new(Vec::new(), alloc::vec![OutputSpec::new("out")])
    }

    fn consumer_specs() -> IoSpecs {
        IoSpecs::new(alloc::vec![InputSpec::new("in")], Vec::new())
    }

    #[test]
    fn add_node_assigns_a_fresh_id_and_bumps_version() {
        let net: Network<Kind> = Network::new();
        let before = net.edit_version();
        let id = net.add_node(Kind("leaf"), leaf_specs());
        assert!(net.contains_node(id));
        assert!(net.edit_version() > before);
    }

    #[test]
    fn connect_links_output_to_input_and_updates_both_sides() {
        let net: Network<Kind> = Network::new();
        let source = net.add_node(Kind("leaf"), leaf_specs());
        let target = net.add_node(Kind("consumer"), consumer_specs());

        let conn = net
            .connect(source, 0, target, "in", Mask::all_set(1), None)
            .expect("connect should succeed");

        net.with_node(target, |node| {
            assert_eq!(node.inputs()[0].connections(), &[conn]);
        });
        net.with_node(source, |node| {
            assert_eq!(node.outputs()[0].source_connections(), &[conn]);
        });
    }

    #[test]
    fn connect_to_unknown_input_name_is_rejected() {
        let net: Network<Kind> = Network::new();
        let source = net.add_node(Kind("leaf"), leaf_specs());
        let target = net.add_node(Kind("consumer"), consumer_specs());
        let result = net.connect(source, 0, target, "missing", Mask::all_set(1), None);
        assert!(result.is_none());
    }

    #[test]
    fn delete_refuses_a_connected_node() {
        let net: Network<Kind> = Network::new();
        let source = net.add_node(Kind("leaf"), leaf_specs());
        let target = net.add_node(Kind("consumer"), consumer_specs());
        net.connect(source, 0, target, "in", Mask::all_set(1), None);
        net.delete(source);
        assert!(net.contains_node(source));
    }

    #[test]
    fn disconnect_then_delete_succeeds_and_frees_the_index() {
        let net: Network<Kind> = Network::new();
        let source = net.add_node(Kind("leaf"), leaf_specs());
        let target = net.add_node(Kind("consumer"), consumer_specs());
        let conn = net
            .connect(source, 0, target, "in", Mask::all_set(1), None)
            .unwrap();
        net.disconnect(conn);
        net.delete(source);
        assert!(!net.contains_node(source));
    }

    #[test]
    fn direct_self_loop_is_rejected_as_a_cycle() {
        let net: Network<Kind> = Network::new();
        let specs = IoSpecs::new(
            alloc::vec![InputSpec::new("in")],
            alloc::vec![OutputSpec::new("out")],
        );
        let node = net.add_node(Kind("loopy"), specs);
        let result = net.connect(node, 0, node, "in", Mask::all_set(1), None);
        assert!(result.is_none());
    }

    #[test]
    fn clear_removes_every_node_and_rebases_ids() {
        let net: Network<Kind> = Network::new();
        let a = net.add_node(Kind("leaf"), leaf_specs());
        net.clear();
        assert!(!net.contains_node(a));
        let b = net.add_node(Kind("leaf"), leaf_specs());
        assert_ne!(a, b);
    }

    #[test]
    fn reorder_input_connections_permutes_in_place() {
        let net: Network<Kind> = Network::new();
        let source = net.add_node(Kind("leaf"), leaf_specs());
        let multi_specs = IoSpecs::new(alloc::vec![InputSpec::new("in")], Vec::new());
        let target = net.add_node(Kind("consumer"), multi_specs);
        let c0 = net
            .connect(source, 0, target, "in", Mask::all_set(1), None)
            .unwrap();
        let c1 = net
            .connect(source, 0, target, "in", Mask::all_set(1), None)
            .unwrap();
        net.reorder_input_connections(target, "in", &[1, 0]);
        net.with_node(target, |node| {
            assert_eq!(node.inputs()[0].connections(), &[c1, c0]);
        });
    }
}
