// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelrelay — Core types and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod operator;
pub mod types;

pub use config::DispatchConfig;
pub use error::RelayError;
pub use types::*;
