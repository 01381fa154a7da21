// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Refcounted interning of input/output shape descriptors shared across structurally identical
//! nodes.
//!
//! Grounded on `pxr/exec/vdf/inputAndOutputSpecsRegistry.h`/`.cpp`: a small concurrent interner
//! keyed by the full `(input specs, output specs)` pair, with a two-phase acquire/release
//! protocol that avoids the classic revive-after-erase race (spec §4.2).

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as DashEntry;

/// Shape descriptor for a single input on a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InputSpec {
    /// The input's name, stable for the lifetime of the node.
    pub name: Box<str>,
    /// If `Some(i)`, this input is the read-write (associated) partner of `outputs[i]` — the
    /// engine's only notion of in-place transformation of vector data (spec §3).
    pub associated_output: Option<u32>,
}

impl InputSpec {
    /// Constructs a plain (non-associated) input spec.
    #[must_use]
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self {
            name: name.into(),
            associated_output: None,
        }
    }

    /// Constructs an input spec associated with output index `output`.
    #[must_use]
    pub fn with_associated_output(name: impl Into<Box<str>>, output: u32) -> Self {
        Self {
            name: name.into(),
            associated_output: Some(output),
        }
    }
}

/// Shape descriptor for a single output on a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputSpec {
    /// The output's name, stable for the lifetime of the node.
    pub name: Box<str>,
}

impl OutputSpec {
    /// Constructs an output spec.
    #[must_use]
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self { name: name.into() }
    }
}

/// The full shape of a node: its ordered inputs and outputs.
///
/// This is the interning key for the [`SpecRegistry`]: two nodes with structurally identical
/// `IoSpecs` share one allocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IoSpecs {
    /// Ordered input specs.
    pub inputs: Vec<InputSpec>,
    /// Ordered output specs.
    pub outputs: Vec<OutputSpec>,
}

impl IoSpecs {
    /// Constructs a new shape descriptor.
    #[must_use]
    pub const fn new(inputs: Vec<InputSpec>, outputs: Vec<OutputSpec>) -> Self {
        Self { inputs, outputs }
    }

    /// Returns the index of the input named `name`, if any.
    #[must_use]
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|i| &*i.name == name)
    }

    /// Returns the index of the output named `name`, if any.
    #[must_use]
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| &*o.name == name)
    }
}

struct Entry {
    specs: IoSpecs,
    refcount: AtomicUsize,
}

/// A handle to a shared, refcounted [`IoSpecs`] acquired from a [`SpecRegistry`].
///
/// Dropping the last handle does not automatically release the registry entry — spec §4.2's
/// acquire/release protocol is explicit, not `Drop`-based, because the registry must be able to
/// tell "no live handles" apart from "never acquired" without relying on allocator-timing.
#[derive(Clone)]
pub struct SharedSpecs(Arc<Entry>);

impl SharedSpecs {
    /// Returns the underlying shape descriptor.
    #[must_use]
    pub fn specs(&self) -> &IoSpecs {
        &self.0.specs
    }
}

impl core::fmt::Debug for SharedSpecs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedSpecs")
            .field("specs", &self.0.specs)
            .field("refcount", &self.0.refcount.load(Ordering::Relaxed))
            .finish()
    }
}

/// A concurrent refcounted interner of [`IoSpecs`], keyed by the full shape.
///
/// `acquire` either creates an entry with refcount `1` or increments the refcount of an existing
/// entry using an atomic counter under non-exclusive access. `release` atomically decrements; if
/// the count reaches zero it then acquires exclusive (per-shard) access and erases the entry only
/// if the refcount is still zero, since another thread may have resurrected it in between.
#[derive(Default)]
pub struct SpecRegistry {
    entries: DashMap<IoSpecs, Arc<Entry>>,
}

impl SpecRegistry {
    /// Constructs an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Acquires a shared handle for `specs`, creating the entry if it does not already exist.
    pub fn acquire(&self, specs: IoSpecs) -> SharedSpecs {
        if let Some(existing) = self.entries.get(&specs) {
            existing.refcount.fetch_add(1, Ordering::AcqRel);
            return SharedSpecs(existing.clone());
        }

        let entry = self.entries.entry(specs.clone()).or_insert_with(|| {
            Arc::new(Entry {
                specs,
                refcount: AtomicUsize::new(0),
            })
        });
        entry.refcount.fetch_add(1, Ordering::AcqRel);
        SharedSpecs(entry.clone())
    }

    /// Releases one reference to `handle`'s underlying entry.
    ///
    /// If this was the last reference, the entry is removed from the registry unless another
    /// thread concurrently re-acquired it (the two-phase check below).
    pub fn release(&self, handle: &SharedSpecs) {
        let was_last = handle.0.refcount.fetch_sub(1, Ordering::AcqRel) == 1;
        if !was_last {
            return;
        }

        if let DashEntry::Occupied(occupied) = self.entries.entry(handle.0.specs.clone())
            && Arc::ptr_eq(occupied.get(), &handle.0)
            && occupied.get().refcount.load(Ordering::Acquire) == 0
        {
            occupied.remove();
        }
    }

    /// Returns the number of distinct shapes currently interned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no shapes are currently interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl core::fmt::Debug for SpecRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpecRegistry")
            .field("len", &self.len())
            .finish()
    }
}
