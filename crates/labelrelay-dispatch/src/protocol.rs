// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Agent connectivity protocol.
//
// The same four inbound message types are meaningful whether they arrive
// over a persistent bidirectional channel or a stateless HTTP poll: the
// transport layer decodes frames to `AgentMessage`, hands them to the
// `ProtocolHandler` with the connection's `SessionState`, and writes the
// returned `ServerMessage` back.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use labelrelay_core::config::DispatchConfig;
use labelrelay_core::error::{RelayError, Result};
use labelrelay_core::types::{JobId, JobStatus, PrintJob};

use crate::keys;
use crate::registry::{AgentRegistry, AgentTransport};
use crate::store::{ResultOutcome, SharedStore};

/// Terminal status an agent reports for a delivered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportedStatus {
    Completed,
    Failed,
}

impl From<ReportedStatus> for JobStatus {
    fn from(status: ReportedStatus) -> Self {
        match status {
            ReportedStatus::Completed => JobStatus::Completed,
            ReportedStatus::Failed => JobStatus::Failed,
        }
    }
}

/// A job as delivered to an agent (pushed or polled).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub job_id: JobId,
    pub printer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usb_device_id: Option<String>,
    pub zpl: String,
    pub copies: u32,
}

impl From<&PrintJob> for JobPayload {
    fn from(job: &PrintJob) -> Self {
        Self {
            job_id: job.id,
            printer_id: job.printer_id.clone(),
            usb_device_id: job.usb_device_id.clone(),
            zpl: job.zpl_data.clone(),
            copies: job.copies,
        }
    }
}

/// Inbound messages from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    #[serde(rename_all = "camelCase")]
    Auth {
        agent_key: String,
        #[serde(default)]
        workstation_info: Option<serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    Heartbeat {
        #[serde(default)]
        connected_printers: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    JobResult {
        job_id: JobId,
        status: ReportedStatus,
        #[serde(default)]
        error: Option<String>,
    },
    Offline,
}

/// Outbound messages to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    AuthSuccess { agent_id: String, agent_name: String },
    #[serde(rename_all = "camelCase")]
    HeartbeatAck {
        jobs: Vec<JobPayload>,
        connected_printers_received: usize,
    },
    #[serde(rename_all = "camelCase")]
    JobResultAck { job_id: JobId, status: ReportedStatus },
    OfflineAck,
    /// Server-initiated delivery over a persistent channel.
    Job { job: JobPayload },
}

/// Authenticated identity of a connection (or of one poll request).
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub org_id: String,
}

/// Per-connection protocol state.
///
/// A persistent channel keeps one of these for its lifetime; a polling
/// transport builds a fresh one per request (each poll re-authenticates).
#[derive(Default)]
pub struct SessionState {
    identity: Option<AgentIdentity>,
    transport: Option<AgentTransport>,
}

impl SessionState {
    /// State for a persistent connection whose outbound frames flow through
    /// `transport`.
    pub fn persistent(transport: AgentTransport) -> Self {
        Self {
            identity: None,
            transport: Some(transport),
        }
    }

    /// State for a stateless poll request (no push channel).
    pub fn polling() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&AgentIdentity> {
        self.identity.as_ref()
    }
}

/// Processes inbound agent messages against the store and the registry.
#[derive(Clone)]
pub struct ProtocolHandler {
    store: SharedStore,
    registry: AgentRegistry,
    config: DispatchConfig,
}

impl ProtocolHandler {
    pub fn new(store: SharedStore, registry: AgentRegistry, config: DispatchConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Decode and handle one raw JSON frame.
    pub async fn handle_frame(
        &self,
        session: &mut SessionState,
        raw: &str,
    ) -> Result<ServerMessage> {
        let message: AgentMessage =
            serde_json::from_str(raw).map_err(|e| RelayError::Validation(e.to_string()))?;
        self.handle(session, message).await
    }

    /// Handle one decoded message.
    ///
    /// Everything except `auth` requires an authenticated session; `auth`
    /// itself is idempotent and re-binds the identity.
    pub async fn handle(
        &self,
        session: &mut SessionState,
        message: AgentMessage,
    ) -> Result<ServerMessage> {
        match message {
            AgentMessage::Auth {
                agent_key,
                workstation_info,
            } => self.handle_auth(session, &agent_key, workstation_info).await,

            AgentMessage::Heartbeat { connected_printers } => {
                let identity = require_identity(session)?;
                self.handle_heartbeat(&identity, connected_printers.len())
                    .await
            }

            AgentMessage::JobResult {
                job_id,
                status,
                error,
            } => {
                let identity = require_identity(session)?;
                self.handle_job_result(&identity, job_id, status, error.as_deref())
                    .await
            }

            AgentMessage::Offline => {
                let identity = require_identity(session)?;
                self.handle_offline(session, &identity).await
            }
        }
    }

    #[instrument(skip_all)]
    async fn handle_auth(
        &self,
        session: &mut SessionState,
        agent_key: &str,
        workstation_info: Option<serde_json::Value>,
    ) -> Result<ServerMessage> {
        let key_hash = keys::hash_key(agent_key);

        let agent = {
            let store = self.store.lock().await;
            let Some(agent) = store.agent_by_key_hash(&key_hash)? else {
                warn!("auth attempt with unknown agent key");
                return Err(RelayError::Authentication);
            };
            if let Some(info) = &workstation_info {
                store.record_workstation(&agent.id, info)?;
            }
            store.touch_agent(&agent.id)?;
            agent
        };

        if let Some(transport) = &session.transport {
            self.registry
                .register(&agent.org_id, &agent.id, transport.clone())
                .await?;
        }

        info!(agent_id = %agent.id, "agent authenticated");
        session.identity = Some(AgentIdentity {
            agent_id: agent.id.clone(),
            org_id: agent.org_id.clone(),
        });

        Ok(ServerMessage::AuthSuccess {
            agent_id: agent.id,
            agent_name: agent.name,
        })
    }

    /// Heartbeat doubles as a work pull: liveness refresh plus a bounded
    /// batch of pending jobs, oldest first, each marked `sent` on the way
    /// out.  One round trip covers both, which keeps the polling fallback
    /// from getting chatty.
    #[instrument(skip(self), fields(agent_id = %identity.agent_id))]
    async fn handle_heartbeat(
        &self,
        identity: &AgentIdentity,
        connected_printers: usize,
    ) -> Result<ServerMessage> {
        // Refreshes the session when one exists; a polling agent has none,
        // which is fine.
        self.registry
            .heartbeat(&identity.org_id, &identity.agent_id)
            .await?;

        let store = self.store.lock().await;
        store.touch_agent(&identity.agent_id)?;

        let pending = store.pending_jobs_for_agent(
            &identity.org_id,
            &identity.agent_id,
            self.config.max_jobs_per_poll,
        )?;

        let mut jobs = Vec::with_capacity(pending.len());
        for job in &pending {
            // A concurrent poll may have claimed the job between the SELECT
            // and here; the guarded UPDATE makes sure only one wins.
            if store.mark_sent(&job.id)? {
                jobs.push(JobPayload::from(job));
            }
        }

        debug!(count = jobs.len(), "jobs handed out on heartbeat");
        Ok(ServerMessage::HeartbeatAck {
            jobs,
            connected_printers_received: connected_printers,
        })
    }

    #[instrument(skip(self), fields(agent_id = %identity.agent_id, job_id = %job_id))]
    async fn handle_job_result(
        &self,
        identity: &AgentIdentity,
        job_id: JobId,
        status: ReportedStatus,
        error: Option<&str>,
    ) -> Result<ServerMessage> {
        let store = self.store.lock().await;
        match store.record_result(&job_id, status.into(), error)? {
            ResultOutcome::Applied => {}
            ResultOutcome::AlreadyTerminal => {
                debug!("duplicate job result acknowledged");
            }
            ResultOutcome::UnknownJob => {
                // Accepted silently — it affects nothing we track.
                warn!("job result for unknown job acknowledged");
            }
        }
        Ok(ServerMessage::JobResultAck { job_id, status })
    }

    /// Graceful shutdown notice: the agent goes offline immediately instead
    /// of lingering until the heartbeat window lapses.
    #[instrument(skip(self, session), fields(agent_id = %identity.agent_id))]
    async fn handle_offline(
        &self,
        session: &mut SessionState,
        identity: &AgentIdentity,
    ) -> Result<ServerMessage> {
        self.registry
            .deregister(&identity.org_id, &identity.agent_id)
            .await?;
        self.store.lock().await.set_agent_offline(&identity.agent_id)?;
        session.identity = None;
        info!("agent went offline");
        Ok(ServerMessage::OfflineAck)
    }
}

fn require_identity(session: &SessionState) -> Result<AgentIdentity> {
    session
        .identity
        .as_ref()
        .cloned()
        .ok_or(RelayError::Authentication)
}
