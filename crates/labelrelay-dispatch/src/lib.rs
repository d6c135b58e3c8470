// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelrelay Dispatch — the dispatch-and-protocol subsystem.  Routes
// rendered labels to directly-addressed network printers or queues them for
// workstation agents, and processes the inbound agent protocol (auth,
// heartbeat/poll, job results, offline notices).

pub mod dispatcher;
pub mod keys;
pub mod network;
pub mod protocol;
pub mod registry;
pub mod store;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use protocol::{AgentMessage, ProtocolHandler, ServerMessage, SessionState};
pub use registry::AgentRegistry;
pub use store::{JobStore, SharedStore};
