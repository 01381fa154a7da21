// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The dependency cache: a memo over requests to the set of nodes/outputs they depend on, kept
//! fresh incrementally as the topology changes.
//!
//! Grounded directly on `pxr/exec/ef/dependencyCache.cpp`: `Find`, `Invalidate`,
//! `WillDeleteConnection`, `DidConnect`, `_Traverse`, `_TraversePartially`,
//! `_GatherDependenciesForNewConnection`, `_GatherDependenciesForExtendedNode` all have
//! one-to-one counterparts below (spec §4.4).

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use dashmap::DashMap;
use hashbrown::HashMap;
use rayon::prelude::*;

use crate::mask::Mask;
use crate::network::network::Network;
use crate::network::node::{NodeId, NodeSpec};
use crate::request::{MaskedOutput, OutputId, Request};
use crate::traverse::output::SparseOutputTraverser;

/// The user-supplied predicate deciding which visited nodes belong in a dependency result.
///
/// Mirrors spec §6's `(node, &outputDeps, &nodeDeps) → bool`.
pub trait DependencyPredicate<S>: Send + Sync {
    /// Returns `true` if `node` should be included in the result's node set.
    fn accept(&self, node: NodeId, output_deps: &HashMap<OutputId, Mask>, node_deps: &[NodeId]) -> bool;
}

impl<S, F> DependencyPredicate<S> for F
where
    F: Fn(NodeId, &HashMap<OutputId, Mask>, &[NodeId]) -> bool + Send + Sync,
{
    fn accept(&self, node: NodeId, output_deps: &HashMap<OutputId, Mask>, node_deps: &[NodeId]) -> bool {
        self(node, output_deps, node_deps)
    }
}

/// The node-kind-specific "what outputs does this input mask reach" computation, supplied by the
/// node compute layer (spec §6: node compute lives outside this crate's core contract).
pub trait DependencyComputation<S>: Send + Sync {
    /// Returns the masks produced on `node`'s outputs when `input_mask` flows into it.
    fn input_to_output_masks(
        &self,
        network: &Network<S>,
        node: NodeId,
        input_mask: &Mask,
    ) -> HashMap<OutputId, Mask>;
}

impl<S, F> DependencyComputation<S> for F
where
    F: Fn(&Network<S>, NodeId, &Mask) -> HashMap<OutputId, Mask> + Send + Sync,
{
    fn input_to_output_masks(
        &self,
        network: &Network<S>,
        node: NodeId,
        input_mask: &Mask,
    ) -> HashMap<OutputId, Mask> {
        self(network, node, input_mask)
    }
}

/// A connection buffered since the last cache update, recorded by stable identifiers rather than
/// a connection pointer so it survives connection-object invalidation (spec §4.4).
#[derive(Clone, Debug)]
struct BufferedConnection {
    source_node: NodeId,
    source_output_name: String,
    target_node: NodeId,
    #[allow(dead_code)]
    target_input_name: String,
    mask: Mask,
}

struct CacheEntry {
    request: Request,
    update_incrementally: bool,
    output_refs: HashMap<OutputId, Mask>,
    node_refs: hashbrown::HashSet<NodeId>,
    node_num_outputs: HashMap<NodeId, usize>,
    output_deps: HashMap<OutputId, Mask>,
    node_deps: Vec<NodeId>,
    new_connections: Vec<BufferedConnection>,
}

impl CacheEntry {
    fn new(request: Request, update_incrementally: bool) -> Self {
        Self {
            request,
            update_incrementally,
            output_refs: HashMap::new(),
            node_refs: hashbrown::HashSet::new(),
            node_num_outputs: HashMap::new(),
            output_deps: HashMap::new(),
            node_deps: Vec::new(),
            new_connections: Vec::new(),
        }
    }
}

/// The public result of [`DependencyCache::find`]: a snapshot, safe to hold after the cache has
/// moved on.
#[derive(Clone, Debug, Default)]
pub struct DependencyResult {
    /// Outputs reached that satisfy the predicate, with the union of masks they were visited
    /// with.
    pub output_deps: HashMap<OutputId, Mask>,
    /// The deduplicated, sorted set of nodes that satisfy the predicate.
    pub node_deps: Vec<NodeId>,
}

/// Returns `true` if entering an already-visited output should halt further descent through it,
/// applying spec §4.4's output-callback semantics and updating `output_refs` in place.
fn merge_output_ref(output_refs: &mut HashMap<OutputId, Mask>, output: OutputId, incoming: &Mask) -> bool {
    match output_refs.get_mut(&output) {
        Some(cached) if cached.contains(incoming) => true,
        Some(cached) if !cached.is_size_inferrable() => {
            *cached = incoming.clone();
            false
        }
        Some(cached) => {
            cached.union_with(incoming);
            false
        }
        None => {
            output_refs.insert(output, incoming.clone());
            false
        }
    }
}

/// A memo over requests to their downstream dependencies, kept fresh incrementally.
pub struct DependencyCache<S> {
    predicate: Arc<dyn DependencyPredicate<S>>,
    dependency_fn: Arc<dyn DependencyComputation<S>>,
    entries: DashMap<Request, CacheEntry>,
}

impl<S> DependencyCache<S>
where
    S: NodeSpec,
{
    /// Constructs an empty cache using `predicate` to select dependency-result membership and
    /// `dependency_fn` to compute input-to-output propagation during incremental updates.
    #[must_use]
    pub fn new(
        predicate: Arc<dyn DependencyPredicate<S>>,
        dependency_fn: Arc<dyn DependencyComputation<S>>,
    ) -> Self {
        Self {
            predicate,
            dependency_fn,
            entries: DashMap::new(),
        }
    }

    /// Returns the cached dependency result for `request`, repopulating (fully or, when possible,
    /// incrementally) first.
    pub fn find(&self, network: &Network<S>, request: Request, incremental: bool) -> DependencyResult {
        if let Some(mut entry) = self.entries.get_mut(&request) {
            if !entry.new_connections.is_empty() {
                self.partial_update(network, &mut entry);
            }
            return Self::snapshot(&mut entry);
        }

        let mut entry = CacheEntry::new(request.clone(), incremental);
        let seed = entry.request.clone();
        self.traverse_and_accumulate(network, &mut entry, &seed);
        let result = Self::snapshot(&mut entry);
        self.entries.insert(request, entry);
        result
    }

    fn snapshot(entry: &mut CacheEntry) -> DependencyResult {
        entry.node_deps.sort_unstable();
        entry.node_deps.dedup();
        DependencyResult {
            output_deps: entry.output_deps.clone(),
            node_deps: entry.node_deps.clone(),
        }
    }

    /// Clears every cached entry.
    pub fn invalidate(&self) {
        self.entries.clear();
    }

    fn traverse_and_accumulate(&self, network: &Network<S>, entry: &mut CacheEntry, seed: &Request) {
        let mut traverser = SparseOutputTraverser::with_cache_capacity(network, 0);
        let predicate = &self.predicate;
        traverser.traverse(seed, |output, mask, _incoming| {
            if merge_output_ref(&mut entry.output_refs, output, mask) {
                return false;
            }
            let Some(node) = network.node_owning_output(output) else {
                return true;
            };
            if entry.node_refs.insert(node) {
                if let Some(count) = network.with_node(node, |n| n.outputs().len()) {
                    entry.node_num_outputs.insert(node, count);
                }
            }
            if predicate.accept(node, &entry.output_deps, &entry.node_deps) {
                entry
                    .output_deps
                    .entry(output)
                    .and_modify(|m| m.union_with(mask))
                    .or_insert_with(|| mask.clone());
                if !entry.node_deps.contains(&node) {
                    entry.node_deps.push(node);
                }
            }
            true
        });
    }

    fn partial_update(&self, network: &Network<S>, entry: &mut CacheEntry) {
        let buffered = core::mem::take(&mut entry.new_connections);
        let mut gathered: HashMap<OutputId, Mask> = HashMap::new();

        for conn in &buffered {
            let source_output = network
                .with_node(conn.source_node, |n| {
                    n.specs()
                        .specs()
                        .output_index(&conn.source_output_name)
                        .and_then(|i| n.outputs().get(i).map(|o| o.id()))
                })
                .flatten();
            let Some(source_output) = source_output else {
                continue;
            };

            if let Some(cached_mask) = entry.output_refs.get(&source_output).cloned() {
                let effective_mask = if cached_mask.is_size_inferrable() {
                    cached_mask.intersection(&conn.mask)
                } else {
                    conn.mask.clone()
                };
                let deps = self
                    .dependency_fn
                    .input_to_output_masks(network, conn.target_node, &effective_mask);
                for (out, mask) in deps {
                    gathered
                        .entry(out)
                        .and_modify(|m| m.union_with(&mask))
                        .or_insert(mask);
                }
                if self
                    .predicate
                    .accept(conn.target_node, &entry.output_deps, &entry.node_deps)
                    && !entry.node_deps.contains(&conn.target_node)
                {
                    entry.node_deps.push(conn.target_node);
                }
                continue;
            }

            let current_count = network
                .with_node(conn.source_node, |n| n.outputs().len())
                .unwrap_or(0);
            let prior_count = entry
                .node_num_outputs
                .get(&conn.source_node)
                .copied()
                .unwrap_or(current_count);
            if current_count == prior_count {
                continue;
            }

            let per_input: Vec<HashMap<OutputId, Mask>> = network
                .with_node(conn.source_node, |n| {
                    n.inputs()
                        .par_iter()
                        .map(|input| {
                            let mut local = HashMap::new();
                            for &conn_id in input.connections() {
                                let Some(c) = network.connection(conn_id) else {
                                    continue;
                                };
                                let deps =
                                    self.dependency_fn
                                        .input_to_output_masks(network, conn.source_node, c.mask());
                                if deps.is_empty() {
                                    // Purely output-sharing extension; skip.
                                    continue;
                                }
                                for (out, mask) in deps {
                                    local
                                        .entry(out)
                                        .and_modify(|m: &mut Mask| m.union_with(&mask))
                                        .or_insert(mask);
                                }
                            }
                            local
                        })
                        .collect()
                })
                .unwrap_or_default();

            for local in per_input {
                for (out, mask) in local {
                    gathered
                        .entry(out)
                        .and_modify(|m| m.union_with(&mask))
                        .or_insert(mask);
                }
            }
            entry.node_num_outputs.insert(conn.source_node, current_count);
        }

        if !gathered.is_empty() {
            let seed = Request::normalized(
                gathered
                    .into_iter()
                    .map(|(output, mask)| MaskedOutput::new(output, mask))
                    .collect(),
            );
            self.traverse_and_accumulate(network, entry, &seed);
        }
    }
}

impl<S> crate::network::network::EditMonitor<S> for DependencyCache<S>
where
    S: NodeSpec,
{
    fn will_delete_connection(&self, _network: &Network<S>, connection: &crate::network::connection::Connection) {
        let mut to_remove = Vec::new();
        for entry in self.entries.iter() {
            if !entry.update_incrementally {
                to_remove.push(entry.key().clone());
                continue;
            }
            if entry.node_refs.contains(&connection.source_node())
                && entry.node_refs.contains(&connection.target_node())
            {
                to_remove.push(entry.key().clone());
            }
        }
        for key in to_remove {
            self.entries.remove(&key);
        }
    }

    fn did_connect(&self, network: &Network<S>, connection: &crate::network::connection::Connection) {
        if connection.mask().is_all_unset() {
            return;
        }
        let Some(source_output_name) = network
            .with_node(connection.source_node(), |n| {
                n.specs()
                    .specs()
                    .outputs
                    .get(connection.source_output() as usize)
                    .map(|o| String::from(&*o.name))
            })
            .flatten()
        else {
            return;
        };
        let Some(target_input_name) = network
            .with_node(connection.target_node(), |n| {
                n.specs()
                    .specs()
                    .inputs
                    .get(connection.target_input() as usize)
                    .map(|i| String::from(&*i.name))
            })
            .flatten()
        else {
            return;
        };

        let mut to_update = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if !entry.update_incrementally {
                to_update.push((entry.key().clone(), true));
                continue;
            }
            if entry.node_refs.contains(&connection.source_node()) {
                entry.new_connections.push(BufferedConnection {
                    source_node: connection.source_node(),
                    source_output_name: source_output_name.clone(),
                    target_node: connection.target_node(),
                    target_input_name: target_input_name.clone(),
                    mask: connection.mask().clone(),
                });
            }
        }
        for (key, invalidate) in to_update {
            if invalidate {
                self.entries.remove(&key);
            }
        }
    }
}

impl<S> core::fmt::Debug for DependencyCache<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DependencyCache")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}
