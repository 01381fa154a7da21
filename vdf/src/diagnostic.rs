// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostic taxonomy and emission.
//!
//! The core never throws: every recoverable failure is reported through a [`Diagnostic`] and the
//! offending call becomes a no-op (or, for iteration, yields an empty range). Unrecoverable
//! invariant violations are still reported as diagnostics but additionally `debug_assert!`, so
//! debug builds abort while release builds keep running on a best-effort basis (spec §7).

use alloc::string::String;

/// One diagnosable condition, grouped by the taxonomy of spec §7.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// A caller violated a documented API contract (null/invalid handle, a cycle introduced at
    /// `Connect`, a second connection on a read-write input, a mask that fails read-write
    /// containment, deleting a still-connected node, double edit-monitor registration, or
    /// mismatched spec pointers passed back to `ReleaseSharedSpecs`).
    ///
    /// The offending call is a no-op.
    ProgrammerContract {
        /// Human-readable description of which contract was violated.
        message: String,
    },
    /// Caller-supplied data did not match the graph's expectations (a mask size mismatch between
    /// a connection and its value, iteration against a nonexistent input/output name, or a
    /// cardinality mismatch in a reference-input wiring helper).
    ///
    /// Iteration yields an empty range; other calls are no-ops.
    ClientData {
        /// Human-readable description of the mismatch.
        message: String,
    },
    /// An invariant that should be impossible to violate through the public API was nonetheless
    /// observed — a dangling spec-registry handle, or an invalid permutation reaching
    /// `ReorderInputConnections` having passed its own precondition check.
    ///
    /// Debug builds additionally `debug_assert!` at the call site; release builds keep running.
    Unrecoverable {
        /// Human-readable description of the violated invariant.
        message: String,
    },
}

impl Diagnostic {
    /// Constructs a [`Diagnostic::ProgrammerContract`].
    #[must_use]
    pub fn programmer_contract(message: impl Into<String>) -> Self {
        Self::ProgrammerContract {
            message: message.into(),
        }
    }

    /// Constructs a [`Diagnostic::ClientData`].
    #[must_use]
    pub fn client_data(message: impl Into<String>) -> Self {
        Self::ClientData {
            message: message.into(),
        }
    }

    /// Constructs a [`Diagnostic::Unrecoverable`].
    #[must_use]
    pub fn unrecoverable(message: impl Into<String>) -> Self {
        Self::Unrecoverable {
            message: message.into(),
        }
    }

    /// Returns the human-readable message carried by this diagnostic, regardless of kind.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::ProgrammerContract { message }
            | Self::ClientData { message }
            | Self::Unrecoverable { message } => message,
        }
    }
}

/// Receives [`Diagnostic`]s emitted by the core.
///
/// Callers that want programmatic access to diagnostics (e.g. to assert on them in tests) can
/// implement this directly; everyone else gets [`TracingDiagnosticSink`], which forwards to
/// `tracing` at a severity matching the diagnostic kind.
pub trait DiagnosticSink {
    /// Records one diagnostic.
    fn emit(&self, diagnostic: Diagnostic);
}

/// The default [`DiagnosticSink`]: forwards every diagnostic to `tracing`, at `warn` for
/// programmer-contract and client-data errors and `error` for unrecoverable ones, additionally
/// `debug_assert!`-ing on the latter (spec §7).
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn emit(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::ProgrammerContract { message } => {
                tracing::warn!(kind = "programmer_contract", %message, "vdf diagnostic");
            }
            Diagnostic::ClientData { message } => {
                tracing::warn!(kind = "client_data", %message, "vdf diagnostic");
            }
            Diagnostic::Unrecoverable { message } => {
                tracing::error!(kind = "unrecoverable", %message, "vdf diagnostic");
                debug_assert!(false, "unrecoverable vdf invariant violated: {message}");
            }
        }
    }
}

/// A [`DiagnosticSink`] that discards everything. Useful in benchmarks and in tests that only
/// care about the no-op behavior, not the diagnostic text.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDiagnosticSink;

impl DiagnosticSink for NullDiagnosticSink {
    fn emit(&self, _diagnostic: Diagnostic) {}
}
