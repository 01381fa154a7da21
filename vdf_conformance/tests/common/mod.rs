// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared scaffolding for the end-to-end scenario tests: a node-kind tag, small I/O shape
//! builders, and a diagnostic sink that records what it sees instead of logging it.

#![allow(dead_code)]

use std::sync::Mutex;

use vdf::{Diagnostic, DiagnosticSink, InputSpec, IoSpecs, NodeSpec, OutputSpec};

/// The only node-kind distinction the engine itself cares about: whether `Connect` may close a
/// cycle through this node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Plain,
    Speculation,
}

impl NodeSpec for Kind {
    fn is_speculation(&self) -> bool {
        matches!(self, Self::Speculation)
    }
}

pub fn specs(inputs: &[&str], outputs: &[&str]) -> IoSpecs {
    IoSpecs::new(
        inputs.iter().map(|n| InputSpec::new(*n)).collect(),
        outputs.iter().map(|n| OutputSpec::new(*n)).collect(),
    )
}

pub fn read_write_specs(read_inputs: &[&str], rw_input: &str, rw_output: &str) -> IoSpecs {
    let mut inputs: Vec<InputSpec> = read_inputs.iter().map(|n| InputSpec::new(*n)).collect();
    inputs.push(InputSpec::with_associated_output(rw_input, 0));
    IoSpecs::new(inputs, vec![OutputSpec::new(rw_output)])
}

/// A [`DiagnosticSink`] that records every diagnostic it receives, for tests that assert on
/// exactly how many (and which) diagnostics a rejected operation produced.
#[derive(Default)]
pub struct RecordingSink {
    recorded: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        self.recorded.lock().unwrap().push(diagnostic);
    }
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }
}
