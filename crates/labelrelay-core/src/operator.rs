// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing error messages.
//
// Every dispatch error is mapped to a short plain-English summary plus a
// suggestion, so an operator knows whether to fix printer configuration,
// check the workstation, or check the physical device.

use crate::error::RelayError;

/// How an operator should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip or offline agent — the queue will retry on the next poll.
    Transient,
    /// Configuration must be corrected before retrying.
    ActionRequired,
    /// The device itself reported a failure — check the printer.
    Device,
}

/// A plain-English rendering of a dispatch error.
#[derive(Debug, Clone)]
pub struct OperatorError {
    /// Short summary (shown as a heading).
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    pub severity: Severity,
}

/// Convert a `RelayError` into something an operator can act on.
pub fn describe(err: &RelayError) -> OperatorError {
    match err {
        RelayError::Configuration(detail) => OperatorError {
            message: "Printer not configured.".into(),
            suggestion: format!("Fix the printer settings and try again. ({detail})"),
            severity: Severity::ActionRequired,
        },

        RelayError::NotConnected(agent_id) => OperatorError {
            message: "Agent offline.".into(),
            suggestion: format!(
                "The workstation agent '{agent_id}' is not connected. The label is queued and \
                 will print automatically when the workstation comes back online."
            ),
            severity: Severity::Transient,
        },

        RelayError::Timeout { operation, seconds } => OperatorError {
            message: "The printer did not respond.".into(),
            suggestion: format!(
                "{operation} timed out after {seconds}s. Check that the printer is powered on \
                 and reachable on the network."
            ),
            severity: Severity::Transient,
        },

        RelayError::Transport(detail) => {
            let suggestion = if detail.contains("refused") {
                "The printer refused the connection. Check the configured port.".into()
            } else {
                format!("Check the network path to the printer. ({detail})")
            };
            OperatorError {
                message: "Couldn't reach the printer.".into(),
                suggestion,
                severity: Severity::Transient,
            }
        }

        RelayError::Authentication => OperatorError {
            message: "Agent key rejected.".into(),
            suggestion: "The workstation agent presented an unknown key. Re-install the agent \
                         with the key shown in the admin screen."
                .into(),
            severity: Severity::ActionRequired,
        },

        RelayError::Validation(detail) => OperatorError {
            message: "The agent sent a malformed message.".into(),
            suggestion: format!("Update the workstation agent to the current version. ({detail})"),
            severity: Severity::ActionRequired,
        },

        RelayError::Database(detail) => OperatorError {
            message: "The job could not be saved.".into(),
            suggestion: format!("Nothing was printed. Retry once storage recovers. ({detail})"),
            severity: Severity::Transient,
        },

        RelayError::Io(e) => OperatorError {
            message: "A local I/O error occurred.".into(),
            suggestion: e.to_string(),
            severity: Severity::Transient,
        },

        RelayError::Serialization(e) => OperatorError {
            message: "A message could not be encoded.".into(),
            suggestion: e.to_string(),
            severity: Severity::ActionRequired,
        },

        RelayError::Registry(detail) => OperatorError {
            message: "The connection registry is unavailable.".into(),
            suggestion: format!("Restart the service if this persists. ({detail})"),
            severity: Severity::Transient,
        },
    }
}
