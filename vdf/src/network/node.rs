// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Nodes and their inputs/outputs.
//!
//! Grounded on `pxr/exec/vdf/node.h`/`input.h`/`output.h` and on `execution_graph`'s `Node`
//! struct (`graph.rs`), generalized so a node's behavior is parameterized by a user-supplied
//! kind `S` rather than hardcoded to one opcode set (spec §9's "tagged-variant over node kinds"
//! design note).

use alloc::vec::Vec;

use crate::id::Id;
use crate::mask::Mask;
use crate::network::connection::ConnectionId;
use crate::spec::SharedSpecs;

/// Stable identity of a [`Node`].
pub type NodeId = Id;

/// Stable identity of an [`Output`], independent of node identity (spec §3: "a stable 64-bit
/// identity independent of node identity, for per-output schedule keying").
pub type OutputId = Id;

/// An ordered list of connections feeding one named input slot.
///
/// A read-write input holds exactly one connection at any time; nothing in this type enforces
/// that — it is enforced by the scheduler, per spec §3, not by the connection primitive.
#[derive(Clone, Debug, Default)]
pub struct Input {
    pub(crate) connections: Vec<ConnectionId>,
    pub(crate) associated_output: Option<u32>,
}

impl Input {
    /// Returns the connections feeding this input, in their declared order.
    #[must_use]
    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    /// Returns the index of the output this input is the read-write partner of, if any.
    #[must_use]
    pub const fn associated_output(&self) -> Option<u32> {
        self.associated_output
    }
}

/// One named output slot on a node.
#[derive(Clone, Debug)]
pub struct Output {
    pub(crate) id: OutputId,
    pub(crate) affects_mask: Option<Mask>,
    pub(crate) source_connections: Vec<ConnectionId>,
    pub(crate) associated_input: Option<u32>,
}

impl Output {
    /// Returns this output's stable identity.
    #[must_use]
    pub const fn id(&self) -> OutputId {
        self.id
    }

    /// Returns the affects mask, if declared. `None` means "always affective" (spec §4.3).
    #[must_use]
    pub const fn affects_mask(&self) -> Option<&Mask> {
        self.affects_mask.as_ref()
    }

    /// Returns the connections on which this output appears as source.
    #[must_use]
    pub fn source_connections(&self) -> &[ConnectionId] {
        &self.source_connections
    }

    /// Returns the index of the input this output is the read-write partner of, if any.
    #[must_use]
    pub const fn associated_input(&self) -> Option<u32> {
        self.associated_input
    }

    /// Returns `true` if this output is a pool output: one whose owning input is associated
    /// (read-write) with it (spec §4.5).
    #[must_use]
    pub const fn is_pool(&self) -> bool {
        self.associated_input.is_some()
    }
}

/// A node's shared, user-supplied kind. Networks are generic over this type so the topology
/// store carries no opinion on what a node actually computes (spec §9).
pub trait NodeSpec: Clone {
    /// Returns `true` if nodes of this kind are allowed to close a cycle through `Connect`
    /// (speculation nodes; spec §4.1).
    fn is_speculation(&self) -> bool {
        false
    }
}

/// A live node: its identity, its kind tag, its shared shape, and its input/output slots.
#[derive(Clone, Debug)]
pub struct Node<S> {
    pub(crate) id: NodeId,
    pub(crate) kind: S,
    pub(crate) specs: SharedSpecs,
    pub(crate) inputs: Vec<Input>,
    pub(crate) outputs: Vec<Output>,
}

impl<S> Node<S> {
    /// Returns this node's stable identity.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the user-supplied kind tag for this node.
    #[must_use]
    pub const fn kind(&self) -> &S {
        &self.kind
    }

    /// Returns the shared shape (input/output specs) this node was constructed with.
    #[must_use]
    pub const fn specs(&self) -> &SharedSpecs {
        &self.specs
    }

    /// Returns this node's inputs, in declared order.
    #[must_use]
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// Returns this node's outputs, in declared order.
    #[must_use]
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Returns `true` if this node has at least one connection on any input or output.
    #[must_use]
    pub fn has_any_connection(&self) -> bool {
        self.inputs.iter().any(|i| !i.connections.is_empty())
            || self
                .outputs
                .iter()
                .any(|o| !o.source_connections.is_empty())
    }
}
