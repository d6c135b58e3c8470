// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelrelay ZPL — pure label rendering.  Turns a `LabelSpec` plus a
// `Template` into ZPL command text.  No I/O, no side effects: identical
// inputs always yield byte-identical output.

pub mod render;
pub mod spec;
pub mod template;

pub use render::render;
pub use spec::{LabelSpec, Symbology};
pub use template::Template;
