// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Agent connection registry.
//
// The single process-local source of truth for "is agent X reachable right
// now".  The session map is owned by one task; handles talk to it over a
// command channel with oneshot replies, so registration, eviction, and push
// for the same agent can never interleave.  Sessions are ephemeral — a
// process restart loses them all, and agents re-authenticate on reconnect.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use labelrelay_core::error::{RelayError, Result};

/// Outbound frame capacity per agent connection.
const TRANSPORT_BUFFER: usize = 32;
/// Command channel capacity for the registry task.
const COMMAND_BUFFER: usize = 64;

/// Sender half of an agent's outbound transport.
///
/// The connection task (websocket writer or equivalent) owns the receiver
/// and drains frames onto the wire; when the registry drops this sender the
/// receiver closes and the connection task shuts the transport down.
pub type AgentTransport = mpsc::Sender<String>;

/// Create a transport pair for a freshly accepted agent connection.
pub fn transport_channel() -> (AgentTransport, mpsc::Receiver<String>) {
    mpsc::channel(TRANSPORT_BUFFER)
}

/// A live agent session.  Never persisted.
struct Session {
    org_id: String,
    transport: AgentTransport,
    connected_at: Instant,
    last_heartbeat: Instant,
}

enum Command {
    Register {
        org_id: String,
        agent_id: String,
        transport: AgentTransport,
        respond_to: oneshot::Sender<()>,
    },
    Deregister {
        org_id: String,
        agent_id: String,
        respond_to: oneshot::Sender<bool>,
    },
    Heartbeat {
        org_id: String,
        agent_id: String,
        respond_to: oneshot::Sender<bool>,
    },
    Push {
        org_id: String,
        agent_id: String,
        frame: String,
        respond_to: oneshot::Sender<Result<()>>,
    },
    IsConnected {
        org_id: String,
        agent_id: String,
        respond_to: oneshot::Sender<bool>,
    },
    ConnectedAgents {
        org_id: String,
        respond_to: oneshot::Sender<Vec<String>>,
    },
}

/// Cloneable handle to the registry task.
#[derive(Clone)]
pub struct AgentRegistry {
    tx: mpsc::Sender<Command>,
}

impl AgentRegistry {
    /// Spawn the registry task.  `freshness` is the heartbeat window beyond
    /// which a session counts as not connected.
    pub fn spawn(freshness: Duration) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(run(rx, freshness));
        Self { tx }
    }

    /// Register a session for `agent_id`, evicting any previous one
    /// (last-writer-wins).
    pub async fn register(
        &self,
        org_id: &str,
        agent_id: &str,
        transport: AgentTransport,
    ) -> Result<()> {
        self.call(|respond_to| Command::Register {
            org_id: org_id.into(),
            agent_id: agent_id.into(),
            transport,
            respond_to,
        })
        .await
    }

    /// Drop the session for `agent_id`, if any.  Returns whether one existed.
    pub async fn deregister(&self, org_id: &str, agent_id: &str) -> Result<bool> {
        self.call(|respond_to| Command::Deregister {
            org_id: org_id.into(),
            agent_id: agent_id.into(),
            respond_to,
        })
        .await
    }

    /// Refresh the session's heartbeat.  Returns whether a session existed.
    pub async fn heartbeat(&self, org_id: &str, agent_id: &str) -> Result<bool> {
        self.call(|respond_to| Command::Heartbeat {
            org_id: org_id.into(),
            agent_id: agent_id.into(),
            respond_to,
        })
        .await
    }

    /// Write one serialized frame to the agent's live transport.
    ///
    /// Any failure here means "not delivered" — the caller falls back to the
    /// persisted queue, never treats it as a terminal job failure.
    pub async fn push(&self, org_id: &str, agent_id: &str, frame: String) -> Result<()> {
        self.call(|respond_to| Command::Push {
            org_id: org_id.into(),
            agent_id: agent_id.into(),
            frame,
            respond_to,
        })
        .await?
    }

    /// Lazy liveness check: a session with a stale heartbeat reports
    /// not-connected even though its entry is still in the table.
    pub async fn is_connected(&self, org_id: &str, agent_id: &str) -> Result<bool> {
        self.call(|respond_to| Command::IsConnected {
            org_id: org_id.into(),
            agent_id: agent_id.into(),
            respond_to,
        })
        .await
    }

    /// Ids of this org's currently-live agents.
    pub async fn connected_agents(&self, org_id: &str) -> Result<Vec<String>> {
        self.call(|respond_to| Command::ConnectedAgents {
            org_id: org_id.into(),
            respond_to,
        })
        .await
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(make(respond_to))
            .await
            .map_err(|_| RelayError::Registry("registry task stopped".into()))?;
        rx.await
            .map_err(|_| RelayError::Registry("registry task dropped request".into()))
    }
}

/// The registry task: sole owner of the session map.
async fn run(mut rx: mpsc::Receiver<Command>, freshness: Duration) {
    let mut sessions: HashMap<String, Session> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Register {
                org_id,
                agent_id,
                transport,
                respond_to,
            } => {
                let now = Instant::now();
                let previous = sessions.insert(
                    agent_id.clone(),
                    Session {
                        org_id,
                        transport,
                        connected_at: now,
                        last_heartbeat: now,
                    },
                );
                if let Some(previous) = previous {
                    // Dropping the old session drops its transport sender,
                    // which closes the superseded connection's channel.
                    info!(
                        agent_id,
                        previous_uptime_secs = previous.connected_at.elapsed().as_secs(),
                        "existing session superseded by new connection"
                    );
                } else {
                    info!(agent_id, "agent session registered");
                }
                let _ = respond_to.send(());
            }

            Command::Deregister {
                org_id,
                agent_id,
                respond_to,
            } => {
                let removed = match sessions.get(&agent_id) {
                    Some(session) if session.org_id == org_id => {
                        sessions.remove(&agent_id);
                        info!(agent_id, "agent session deregistered");
                        true
                    }
                    _ => false,
                };
                let _ = respond_to.send(removed);
            }

            Command::Heartbeat {
                org_id,
                agent_id,
                respond_to,
            } => {
                let refreshed = match sessions.get_mut(&agent_id) {
                    Some(session) if session.org_id == org_id => {
                        session.last_heartbeat = Instant::now();
                        true
                    }
                    _ => false,
                };
                let _ = respond_to.send(refreshed);
            }

            Command::Push {
                org_id,
                agent_id,
                frame,
                respond_to,
            } => {
                let result = push_frame(&mut sessions, freshness, &org_id, &agent_id, frame);
                let _ = respond_to.send(result);
            }

            Command::IsConnected {
                org_id,
                agent_id,
                respond_to,
            } => {
                let connected = sessions
                    .get(&agent_id)
                    .is_some_and(|s| s.org_id == org_id && s.last_heartbeat.elapsed() < freshness);
                let _ = respond_to.send(connected);
            }

            Command::ConnectedAgents { org_id, respond_to } => {
                let mut agents: Vec<String> = sessions
                    .iter()
                    .filter(|(_, s)| {
                        s.org_id == org_id && s.last_heartbeat.elapsed() < freshness
                    })
                    .map(|(id, _)| id.clone())
                    .collect();
                agents.sort();
                let _ = respond_to.send(agents);
            }
        }
    }

    debug!("registry task stopped");
}

fn push_frame(
    sessions: &mut HashMap<String, Session>,
    freshness: Duration,
    org_id: &str,
    agent_id: &str,
    frame: String,
) -> Result<()> {
    // An org mismatch behaves exactly like an absent session: one tenant's
    // agents are never reachable from another tenant's dispatch calls.
    let session = match sessions.get(agent_id) {
        Some(session) if session.org_id == org_id => session,
        _ => return Err(RelayError::NotConnected(agent_id.into())),
    };

    if session.last_heartbeat.elapsed() >= freshness {
        debug!(agent_id, "session heartbeat stale, reporting not connected");
        return Err(RelayError::NotConnected(agent_id.into()));
    }

    if let Err(e) = session.transport.try_send(frame) {
        // A dead or clogged transport is evicted immediately; the caller
        // falls back to the persisted queue.
        warn!(agent_id, error = %e, "push failed, evicting session");
        sessions.remove(agent_id);
        return Err(RelayError::Transport(format!(
            "push to agent {agent_id}: {e}"
        )));
    }

    debug!(agent_id, "frame pushed to agent transport");
    Ok(())
}
