// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The topology store: nodes, connections, and the network that owns them (spec §3, §4.1).

pub mod connection;
pub mod network;
pub mod node;

pub use connection::{Connection, ConnectionId};
pub use network::{EditMonitor, Network, Rejected};
pub use node::{Input, Node, NodeId, NodeSpec, Output, OutputId};
