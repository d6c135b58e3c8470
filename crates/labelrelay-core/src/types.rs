// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Labelrelay dispatch core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RelayError;

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job id from its canonical string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of label a job prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Production batch label.
    Batch,
    /// Point-of-sale price label.
    Sale,
    /// Warehouse location marker.
    Location,
    /// Shipping trolley manifest label.
    Trolley,
    /// EU plant passport label.
    Passport,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Sale => "sale",
            Self::Location => "location",
            Self::Trolley => "trolley",
            Self::Passport => "passport",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "batch" => Some(Self::Batch),
            "sale" => Some(Self::Sale),
            "location" => Some(Self::Location),
            "trolley" => Some(Self::Trolley),
            "passport" => Some(Self::Passport),
            _ => None,
        }
    }
}

/// Lifecycle states of a print job.
///
/// Transitions are monotonic: `Pending → Sent → {Completed | Failed}`.
/// Terminal states are final — the store refuses any further transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, not yet handed to any transport.
    Pending,
    /// Handed to a transport; awaiting the agent's result report.
    Sent,
    /// Agent confirmed the label printed.
    Completed,
    /// Agent reported a print failure — see job error field.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A queued (or finished) print job, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    /// Owning tenant — every query is scoped by this.
    pub org_id: String,
    pub printer_id: String,
    /// Set for agent-path jobs; always `None` would mean a direct network
    /// printer, which never gets a job row in the first place.
    pub agent_id: Option<String>,
    pub job_type: JobType,
    /// Copied from the printer config at creation so a poll response can be
    /// built without consulting the external printer store.
    pub usb_device_id: Option<String>,
    /// The rendered ZPL command text.
    pub zpl_data: String,
    pub copies: u32,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl PrintJob {
    /// Create a fresh `Pending` job for the agent path.
    pub fn new(
        org_id: impl Into<String>,
        printer_id: impl Into<String>,
        agent_id: impl Into<String>,
        job_type: JobType,
        usb_device_id: Option<String>,
        zpl_data: String,
        copies: u32,
    ) -> Self {
        Self {
            id: JobId::new(),
            org_id: org_id.into(),
            printer_id: printer_id.into(),
            agent_id: Some(agent_id.into()),
            job_type,
            usb_device_id,
            zpl_data,
            copies: copies.max(1),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            completed_at: None,
            error_message: None,
        }
    }
}

/// How a printer is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Directly addressable over TCP (host + port required).
    Network,
    /// Driven by a workstation agent (agent_id required).
    Agent,
}

/// Printer configuration, as supplied by the external printer store.
///
/// The required-field set is mutually exclusive and fully determined by
/// `connection_type`; `validate()` enforces it before any dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Printer {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub connection_type: ConnectionType,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub agent_id: Option<String>,
    /// Which USB-attached device the agent should drive, when it has several.
    pub usb_device_id: Option<String>,
}

impl Printer {
    /// Check that the fields required by `connection_type` are present.
    pub fn validate(&self) -> Result<(), RelayError> {
        match self.connection_type {
            ConnectionType::Network => {
                if self.host.as_deref().is_none_or(str::is_empty) {
                    return Err(RelayError::Configuration(format!(
                        "network printer {} has no host",
                        self.id
                    )));
                }
                if self.port.is_none() {
                    return Err(RelayError::Configuration(format!(
                        "network printer {} has no port",
                        self.id
                    )));
                }
            }
            ConnectionType::Agent => {
                if self.agent_id.as_deref().is_none_or(str::is_empty) {
                    return Err(RelayError::Configuration(format!(
                        "agent printer {} is not bound to an agent",
                        self.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A registered workstation agent, as persisted.
///
/// `key_hash` is the SHA-256 hex digest of the pre-shared secret — the raw
/// secret is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub key_hash: String,
    /// Free-form metadata reported by the workstation (hostname, OS, version).
    pub workstation_info: Option<serde_json::Value>,
    pub online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}
