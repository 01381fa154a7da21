// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! No library surface of its own: this crate exists to host the `tests/` integration suite that
//! exercises end-to-end scenarios against the `vdf` crate's public API.
