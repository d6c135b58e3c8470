// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch configuration.

use serde::{Deserialize, Serialize};

/// Operational settings for the dispatch core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Connect + write timeout for direct network printers, in seconds.
    pub network_timeout_secs: u64,
    /// How recent an agent's last heartbeat must be for it to count as
    /// connected, in seconds.
    pub heartbeat_window_secs: u64,
    /// Maximum number of pending jobs handed out per heartbeat poll.
    pub max_jobs_per_poll: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            network_timeout_secs: 5,
            heartbeat_window_secs: 120,
            max_jobs_per_poll: 10,
        }
    }
}
