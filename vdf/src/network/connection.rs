// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Connections: the network-owned edges between an output and an input.

use crate::id::Id;
use crate::mask::Mask;

/// Stable identity of a [`Connection`].
pub type ConnectionId = Id;

/// An edge from a source output to a target input, carrying the subset of indices that flow
/// through it.
///
/// Unowned by either endpoint in the value sense — the network owns the connection and the node
/// at either end only ever sees it by [`ConnectionId`] (spec §3: "Unowned by node or input in the
/// value sense; the network owns it").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub(crate) id: ConnectionId,
    pub(crate) source_node: Id,
    pub(crate) source_output: u32,
    pub(crate) target_node: Id,
    pub(crate) target_input: u32,
    pub(crate) mask: Mask,
}

impl Connection {
    /// Returns this connection's stable identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the node owning the source output.
    #[must_use]
    pub const fn source_node(&self) -> Id {
        self.source_node
    }

    /// Returns the source node's output index this connection reads from.
    #[must_use]
    pub const fn source_output(&self) -> u32 {
        self.source_output
    }

    /// Returns the node owning the target input.
    #[must_use]
    pub const fn target_node(&self) -> Id {
        self.target_node
    }

    /// Returns the target node's input index this connection feeds.
    #[must_use]
    pub const fn target_input(&self) -> u32 {
        self.target_input
    }

    /// Returns the mask selecting which indices flow through this connection.
    #[must_use]
    pub const fn mask(&self) -> &Mask {
        &self.mask
    }
}
