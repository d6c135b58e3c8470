// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Labelrelay.

use thiserror::Error;

/// Top-level error type for all Labelrelay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    // -- Dispatch errors --
    #[error("printer misconfigured: {0}")]
    Configuration(String),

    #[error("agent {0} is not connected")]
    NotConnected(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    // -- Protocol errors --
    #[error("agent authentication failed")]
    Authentication,

    #[error("invalid protocol message: {0}")]
    Validation(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Internal plumbing --
    #[error("registry unavailable: {0}")]
    Registry(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RelayError>;
