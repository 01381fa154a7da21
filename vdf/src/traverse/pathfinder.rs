// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sparse path finding: enumerates every distinct relevant path from a start output to a target
//! output.
//!
//! Grounded on `sparsePathFinder.cpp` §4.3's "path-finder variant": paths are recorded as
//! segments with `(path id, length)` handles and parent/child links; two paths that reach the
//! same connection are resolved after the main walk by stitching the shorter prefix onto each
//! reachable suffix whose relevance id differs from the prefix's, rather than re-walking from
//! the meeting point during the main traversal (spec §4.3).

use alloc::vec::Vec;

use crate::mask::Mask;
use crate::network::connection::ConnectionId;
use crate::network::network::Network;
use crate::network::node::NodeSpec;
use crate::request::OutputId;

/// Identifies one path segment recorded during a search.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PathId(usize);

#[derive(Clone, Debug)]
struct Segment {
    length: usize,
    parent: Option<PathId>,
    connection: ConnectionId,
    relevance_id: u32,
    mask: Mask,
}

/// A completed path from the search's start output to its target output.
#[derive(Clone, Debug)]
pub struct PathResult {
    /// The connections comprising the path, in traversal order (start to target).
    pub connections: Vec<ConnectionId>,
    /// The mask that reached the target along this path.
    pub mask: Mask,
}

struct PotentialResult {
    prefix: PathId,
    meeting_connection: ConnectionId,
}

/// Finds every distinct relevant path between a start and a target output.
pub struct SparsePathFinder<'net, S> {
    network: &'net Network<S>,
    segments: Vec<Segment>,
    /// Maps a connection already used by some path to the segment that reached it first, so a
    /// second path arriving at the same connection is deferred rather than re-descended live.
    connection_owner: hashbrown::HashMap<ConnectionId, PathId>,
    potential: Vec<PotentialResult>,
    results: Vec<PathResult>,
}

impl<'net, S> SparsePathFinder<'net, S>
where
    S: NodeSpec,
{
    /// Constructs a path finder bound to `network`.
    #[must_use]
    pub fn new(network: &'net Network<S>) -> Self {
        Self {
            network,
            segments: Vec::new(),
            connection_owner: hashbrown::HashMap::new(),
            potential: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Searches from `start` to `target`, descending only through inputs for which
    /// `input_relevant` (applied to the input's declared name) returns `true`. Returns every
    /// distinct relevant path found, including those stitched together from deferred "potential
    /// results" at shared connections.
    pub fn find(
        &mut self,
        start: OutputId,
        target: OutputId,
        mask: &Mask,
        mut input_relevant: impl FnMut(&str) -> bool,
    ) -> Vec<PathResult> {
        self.segments.clear();
        self.connection_owner.clear();
        self.potential.clear();
        self.results.clear();

        self.walk(start, target, mask, None, 0, &mut input_relevant);
        self.finalize_potential_results(target);

        core::mem::take(&mut self.results)
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &mut self,
        output: OutputId,
        target: OutputId,
        mask: &Mask,
        parent: Option<PathId>,
        relevance_id: u32,
        input_relevant: &mut impl FnMut(&str) -> bool,
    ) {
        let Some(owner) = self.network.node_owning_output(output) else {
            return;
        };

        let mut consumers: Vec<(ConnectionId, Mask)> = Vec::new();
        self.network.for_each_node(|node| {
            for (input_index, input) in node.inputs().iter().enumerate() {
                for &conn_id in input.connections() {
                    let Some(conn) = self.network.connection(conn_id) else {
                        continue;
                    };
                    if conn.source_node() != owner {
                        continue;
                    }
                    let source_matches = self
                        .network
                        .with_node(owner, |n| {
                            n.outputs().get(conn.source_output() as usize).map(|o| o.id())
                        })
                        .flatten()
                        == Some(output);
                    if !source_matches {
                        continue;
                    }
                    let input_name = node
                        .specs()
                        .specs()
                        .inputs
                        .get(input_index)
                        .map(|i| &*i.name);
                    if !input_name.is_some_and(|n| input_relevant(n)) {
                        continue;
                    }
                    let next_mask = conn.mask().intersection(mask);
                    if next_mask.is_all_unset() {
                        continue;
                    }
                    consumers.push((conn_id, next_mask));
                }
            }
        });

        for (conn_id, next_mask) in consumers {
            if let Some(&existing_owner) = self.connection_owner.get(&conn_id) {
                if let Some(current) = parent {
                    if self.segments[current.0].relevance_id != relevance_id {
                        self.potential.push(PotentialResult {
                            prefix: current,
                            meeting_connection: conn_id,
                        });
                    }
                }
                let _ = existing_owner;
                continue;
            }

            let segment_id = PathId(self.segments.len());
            self.segments.push(Segment {
                length: parent.map_or(0, |p| self.segments[p.0].length + 1),
                parent,
                connection: conn_id,
                relevance_id,
                mask: next_mask.clone(),
            });
            self.connection_owner.insert(conn_id, segment_id);

            let Some(conn) = self.network.connection(conn_id) else {
                continue;
            };
            let target_node = conn.target_node();
            let reachable_outputs: Vec<(OutputId, Mask)> = self
                .network
                .with_node(target_node, |n| {
                    n.outputs()
                        .iter()
                        .filter(|o| {
                            o.affects_mask().is_none_or(|affects| affects.overlaps(&next_mask))
                        })
                        .map(|o| (o.id(), next_mask.clone()))
                        .collect()
                })
                .unwrap_or_default();

            let mut reached_target = false;
            for (next_output, mask_here) in &reachable_outputs {
                if *next_output == target {
                    reached_target = true;
                } else {
                    self.walk(*next_output, target, mask_here, Some(segment_id), relevance_id, input_relevant);
                }
            }
            if reached_target {
                self.emit_result(segment_id);
            }
        }
    }

    fn emit_result(&mut self, leaf: PathId) {
        let mut connections = Vec::new();
        let mut current = Some(leaf);
        let mut mask = Mask::empty();
        while let Some(id) = current {
            let segment = &self.segments[id.0];
            connections.push(segment.connection);
            if mask.is_size_inferrable() {
                mask.union_with(&segment.mask);
            } else {
                mask = segment.mask.clone();
            }
            current = segment.parent;
        }
        connections.reverse();
        self.results.push(PathResult { connections, mask });
    }

    /// Stitches each deferred potential result's prefix onto every completed path whose leaf
    /// passed through the same meeting connection and whose relevance id differs from the
    /// prefix's — the two paths that met there are genuinely distinct routes to the target.
    fn finalize_potential_results(&mut self, _target: OutputId) {
        let potential = core::mem::take(&mut self.potential);
        for candidate in potential {
            let Some(&suffix_owner) = self.connection_owner.get(&candidate.meeting_connection)
            else {
                continue;
            };
            if self.segments[suffix_owner.0].relevance_id
                == self.segments[candidate.prefix.0].relevance_id
            {
                continue;
            }

            let mut prefix_connections = Vec::new();
            let mut current = Some(candidate.prefix);
            while let Some(id) = current {
                prefix_connections.push(self.segments[id.0].connection);
                current = self.segments[id.0].parent;
            }
            prefix_connections.reverse();

            let mut suffix_connections = Vec::new();
            let mut current = Some(suffix_owner);
            while let Some(id) = current {
                suffix_connections.push(self.segments[id.0].connection);
                current = self.segments[id.0].parent;
            }
            suffix_connections.reverse();

            let mut stitched = prefix_connections;
            stitched.extend(suffix_connections);
            let mask = self.segments[suffix_owner.0].mask.clone();
            self.results.push(PathResult {
                connections: stitched,
                mask,
            });
        }
    }
}
