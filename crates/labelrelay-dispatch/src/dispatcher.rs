// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job dispatch — the single entry point that routes a rendered label to a
// printer.
//
// Network printers get a short-lived socket write and no job row.  Agent
// printers get a two-phase write: the job is committed as `pending` first,
// then delivery is attempted as a separate, retryable side effect.  A failed
// push is not a failed dispatch — the job is already durable and the agent's
// next poll will pick it up.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use labelrelay_core::config::DispatchConfig;
use labelrelay_core::error::{RelayError, Result};
use labelrelay_core::types::{ConnectionType, JobId, JobType, Printer, PrintJob};

use crate::network;
use crate::protocol::{JobPayload, ServerMessage};
use crate::registry::AgentRegistry;
use crate::store::SharedStore;

/// How a dispatch call resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Network path: bytes were written to the printer's socket.
    Delivered,
    /// Agent path: pushed over a live channel; the job is `sent`.
    Pushed { job_id: JobId },
    /// Agent path: agent unreachable; the job is durable in `pending` and
    /// will surface on the agent's next poll.
    Queued { job_id: JobId },
}

/// Routes rendered labels to the network path or the agent path.
#[derive(Clone)]
pub struct Dispatcher {
    store: SharedStore,
    registry: AgentRegistry,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(store: SharedStore, registry: AgentRegistry, config: DispatchConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Dispatch a rendered label to `printer`.
    ///
    /// Configuration errors are returned synchronously.  On the agent path,
    /// push failures are swallowed into the `Queued` outcome; only a storage
    /// failure is fatal.
    #[instrument(skip(self, zpl), fields(printer_id = %printer.id))]
    pub async fn dispatch(
        &self,
        printer: &Printer,
        zpl: String,
        job_type: JobType,
        copies: u32,
    ) -> Result<DispatchOutcome> {
        printer.validate()?;

        match printer.connection_type {
            ConnectionType::Network => self.dispatch_network(printer, &zpl).await,
            ConnectionType::Agent => {
                self.dispatch_agent(printer, zpl, job_type, copies).await
            }
        }
    }

    /// Fire-and-forget write to a directly-addressed printer.
    async fn dispatch_network(&self, printer: &Printer, zpl: &str) -> Result<DispatchOutcome> {
        // validate() guarantees host and port are present.
        let host = printer
            .host
            .as_deref()
            .ok_or_else(|| RelayError::Configuration(format!("printer {} has no host", printer.id)))?;
        let port = printer
            .port
            .ok_or_else(|| RelayError::Configuration(format!("printer {} has no port", printer.id)))?;

        network::send_raw(
            host,
            port,
            zpl.as_bytes(),
            Duration::from_secs(self.config.network_timeout_secs),
        )
        .await?;

        info!(printer_id = %printer.id, "label delivered to network printer");
        Ok(DispatchOutcome::Delivered)
    }

    /// Two-phase agent dispatch: persist as `pending`, then try one push.
    async fn dispatch_agent(
        &self,
        printer: &Printer,
        zpl: String,
        job_type: JobType,
        copies: u32,
    ) -> Result<DispatchOutcome> {
        let agent_id = printer.agent_id.as_deref().ok_or_else(|| {
            RelayError::Configuration(format!("printer {} is not bound to an agent", printer.id))
        })?;

        let job = PrintJob::new(
            printer.org_id.clone(),
            printer.id.clone(),
            agent_id,
            job_type,
            printer.usb_device_id.clone(),
            zpl,
            copies,
        );
        let job_id = job.id;

        // Durability first: the job must exist in `pending` before any
        // delivery attempt, so a failed push can never lose it.
        let frame = serde_json::to_string(&ServerMessage::Job {
            job: JobPayload::from(&job),
        })?;
        self.store.lock().await.insert_job(&job)?;

        // One immediate push attempt; after that the polling fallback owns
        // delivery.
        match self.registry.push(&printer.org_id, agent_id, frame).await {
            Ok(()) => {
                let marked = self.store.lock().await.mark_sent(&job_id)?;
                if !marked {
                    // A concurrent poll got there first; the agent will
                    // receive the job at most twice and result reporting is
                    // idempotent.
                    warn!(job_id = %job_id, "pushed job was already claimed by a poll");
                }
                info!(job_id = %job_id, agent_id, "job pushed to live agent session");
                Ok(DispatchOutcome::Pushed { job_id })
            }
            Err(RelayError::NotConnected(_)) | Err(RelayError::Transport(_)) => {
                debug!(job_id = %job_id, agent_id, "agent unreachable, job queued for poll");
                Ok(DispatchOutcome::Queued { job_id })
            }
            Err(other) => Err(other),
        }
    }
}
