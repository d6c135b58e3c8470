// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent print job and agent store backed by SQLite.
//
// The store owns the job state machine: every status change goes through a
// guarded UPDATE whose WHERE clause encodes the legal transitions, so a job
// can never move backward or leave a terminal state regardless of how many
// concurrent dispatchers and protocol handlers are talking to it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use labelrelay_core::error::{RelayError, Result};
use labelrelay_core::types::{Agent, JobId, JobStatus, JobType, PrintJob};

/// Shared handle used by the dispatcher and the protocol handler.
///
/// `rusqlite` is synchronous; callers hold the lock only for the duration of
/// a single statement.
pub type SharedStore = Arc<Mutex<JobStore>>;

/// SQLite schema for the jobs and agents tables.
const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        org_id TEXT NOT NULL,
        printer_id TEXT NOT NULL,
        agent_id TEXT,
        job_type TEXT NOT NULL,
        usb_device_id TEXT,
        zpl_data TEXT NOT NULL,
        copies INTEGER NOT NULL DEFAULT 1,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        sent_at TEXT,
        completed_at TEXT,
        error_message TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_jobs_agent_pending
        ON jobs (org_id, agent_id, status, created_at);
    CREATE TABLE IF NOT EXISTS agents (
        id TEXT PRIMARY KEY,
        org_id TEXT NOT NULL,
        name TEXT NOT NULL,
        key_hash TEXT NOT NULL,
        workstation_info TEXT,
        online INTEGER NOT NULL DEFAULT 0,
        last_seen_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_agents_key_hash ON agents (key_hash);
"#;

/// What happened when a job result was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOutcome {
    /// The job moved to the reported terminal state.
    Applied,
    /// The job was already terminal — accepted as a no-op, nothing changed.
    AlreadyTerminal,
    /// No such job — accepted silently, it affects nothing we track.
    UnknownJob,
}

/// Job and agent store backed by a SQLite database.
pub struct JobStore {
    conn: Connection,
}

impl JobStore {
    /// Open (or create) the store at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| RelayError::Database(format!("open: {e}")))?;

        // WAL mode survives unclean shutdowns more gracefully and lets the
        // poll path read while a dispatch is writing.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| RelayError::Database(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| RelayError::Database(format!("create tables: {e}")))?;

        info!("job store opened");
        Ok(Self { conn })
    }

    /// Open an in-memory store (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RelayError::Database(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| RelayError::Database(format!("create tables: {e}")))?;

        debug!("in-memory job store opened");
        Ok(Self { conn })
    }

    /// Wrap a store in the shared handle used across tasks.
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    // -- Jobs ---------------------------------------------------------------

    /// Insert a freshly created job (normally in `Pending` state).
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub fn insert_job(&self, job: &PrintJob) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO jobs (id, org_id, printer_id, agent_id, job_type, usb_device_id,
                 zpl_data, copies, status, created_at, sent_at, completed_at, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    job.id.to_string(),
                    job.org_id,
                    job.printer_id,
                    job.agent_id,
                    job.job_type.as_str(),
                    job.usb_device_id,
                    job.zpl_data,
                    job.copies,
                    job.status.as_str(),
                    job.created_at.to_rfc3339(),
                    job.sent_at.map(|t| t.to_rfc3339()),
                    job.completed_at.map(|t| t.to_rfc3339()),
                    job.error_message,
                ],
            )
            .map_err(|e| RelayError::Database(format!("insert job: {e}")))?;

        info!(job_id = %job.id, printer_id = %job.printer_id, "job inserted");
        Ok(())
    }

    /// Retrieve a single job by its ID.  Returns `None` if it does not exist.
    pub fn get_job(&self, job_id: &JobId) -> Result<Option<PrintJob>> {
        self.conn
            .query_row(
                "SELECT id, org_id, printer_id, agent_id, job_type, usb_device_id, zpl_data,
                        copies, status, created_at, sent_at, completed_at, error_message
                 FROM jobs WHERE id = ?1",
                params![job_id.to_string()],
                row_to_job,
            )
            .optional()
            .map_err(|e| RelayError::Database(format!("get job: {e}")))
    }

    /// Transition a job `pending → sent`, stamping `sent_at`.
    ///
    /// Returns `false` when the job was not in `pending` (already handed out
    /// by a concurrent poll, or terminal) — the caller must then not deliver
    /// its payload again from this code path.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn mark_sent(&self, job_id: &JobId) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE jobs SET status = 'sent', sent_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                params![Utc::now().to_rfc3339(), job_id.to_string()],
            )
            .map_err(|e| RelayError::Database(format!("mark sent: {e}")))?;

        debug!(job_id = %job_id, applied = rows > 0, "mark sent");
        Ok(rows > 0)
    }

    /// Apply a terminal job result (idempotently).
    ///
    /// Already-terminal and unknown job ids are accepted as no-ops — result
    /// reporting is at-least-once, so duplicates are expected and must not
    /// disturb the recorded outcome or its timestamp.
    #[instrument(skip(self), fields(job_id = %job_id, status = status.as_str()))]
    pub fn record_result(
        &self,
        job_id: &JobId,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<ResultOutcome> {
        if !status.is_terminal() {
            return Err(RelayError::Validation(format!(
                "job result status must be terminal, got '{}'",
                status.as_str()
            )));
        }

        let rows = self
            .conn
            .execute(
                "UPDATE jobs SET status = ?1, completed_at = ?2, error_message = ?3
                 WHERE id = ?4 AND status IN ('pending', 'sent')",
                params![
                    status.as_str(),
                    Utc::now().to_rfc3339(),
                    error_message,
                    job_id.to_string(),
                ],
            )
            .map_err(|e| RelayError::Database(format!("record result: {e}")))?;

        if rows > 0 {
            info!(job_id = %job_id, status = status.as_str(), "job result recorded");
            return Ok(ResultOutcome::Applied);
        }

        let exists: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM jobs WHERE id = ?1",
                params![job_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RelayError::Database(format!("check job: {e}")))?;

        match exists {
            Some(current) => {
                debug!(job_id = %job_id, current, "duplicate result for terminal job ignored");
                Ok(ResultOutcome::AlreadyTerminal)
            }
            None => {
                warn!(job_id = %job_id, "result for unknown job ignored");
                Ok(ResultOutcome::UnknownJob)
            }
        }
    }

    /// Pending jobs addressed to one agent, oldest first, bounded by `limit`.
    pub fn pending_jobs_for_agent(
        &self,
        org_id: &str,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<PrintJob>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, org_id, printer_id, agent_id, job_type, usb_device_id, zpl_data,
                        copies, status, created_at, sent_at, completed_at, error_message
                 FROM jobs
                 WHERE org_id = ?1 AND agent_id = ?2 AND status = 'pending'
                 ORDER BY created_at ASC LIMIT ?3",
            )
            .map_err(|e| RelayError::Database(format!("prepare pending: {e}")))?;

        let jobs = stmt
            .query_map(params![org_id, agent_id, limit], row_to_job)
            .map_err(|e| RelayError::Database(format!("query pending: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RelayError::Database(format!("collect rows: {e}")))?;

        debug!(agent_id, count = jobs.len(), "pending jobs fetched");
        Ok(jobs)
    }

    // -- Agents -------------------------------------------------------------

    /// Register (or replace) an agent row.  Provisioning-time operation.
    pub fn upsert_agent(&self, agent: &Agent) -> Result<()> {
        let info_json = agent
            .workstation_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn
            .execute(
                "INSERT INTO agents (id, org_id, name, key_hash, workstation_info, online, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     org_id = excluded.org_id,
                     name = excluded.name,
                     key_hash = excluded.key_hash",
                params![
                    agent.id,
                    agent.org_id,
                    agent.name,
                    agent.key_hash,
                    info_json,
                    agent.online,
                    agent.last_seen_at.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(|e| RelayError::Database(format!("upsert agent: {e}")))?;
        Ok(())
    }

    /// Look up the agent whose pre-shared key hashes to `key_hash`.
    pub fn agent_by_key_hash(&self, key_hash: &str) -> Result<Option<Agent>> {
        self.conn
            .query_row(
                "SELECT id, org_id, name, key_hash, workstation_info, online, last_seen_at
                 FROM agents WHERE key_hash = ?1",
                params![key_hash],
                row_to_agent,
            )
            .optional()
            .map_err(|e| RelayError::Database(format!("agent by key: {e}")))
    }

    pub fn get_agent(&self, agent_id: &str) -> Result<Option<Agent>> {
        self.conn
            .query_row(
                "SELECT id, org_id, name, key_hash, workstation_info, online, last_seen_at
                 FROM agents WHERE id = ?1",
                params![agent_id],
                row_to_agent,
            )
            .optional()
            .map_err(|e| RelayError::Database(format!("get agent: {e}")))
    }

    /// Persist the workstation metadata an agent reported at auth time.
    pub fn record_workstation(
        &self,
        agent_id: &str,
        info: &serde_json::Value,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE agents SET workstation_info = ?1 WHERE id = ?2",
                params![serde_json::to_string(info)?, agent_id],
            )
            .map_err(|e| RelayError::Database(format!("record workstation: {e}")))?;
        Ok(())
    }

    /// Mark an agent seen now (and online).
    pub fn touch_agent(&self, agent_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE agents SET online = 1, last_seen_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), agent_id],
            )
            .map_err(|e| RelayError::Database(format!("touch agent: {e}")))?;
        Ok(())
    }

    /// Mark an agent offline (explicit shutdown notice).
    pub fn set_agent_offline(&self, agent_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE agents SET online = 0 WHERE id = ?1",
                params![agent_id],
            )
            .map_err(|e| RelayError::Database(format!("set agent offline: {e}")))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn parse_timestamp(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn text_parse_failure(column: usize, what: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unrecognized {what}").into(),
    )
}

/// Map a SQLite row to a `PrintJob`.  Column indices must match the SELECT
/// order used in the query methods above.
fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrintJob> {
    let id_str: String = row.get(0)?;
    let id = JobId::parse(&id_str).ok_or_else(|| text_parse_failure(0, "job id"))?;

    let job_type_str: String = row.get(4)?;
    let job_type =
        JobType::parse(&job_type_str).ok_or_else(|| text_parse_failure(4, "job type"))?;

    let status_str: String = row.get(8)?;
    let status =
        JobStatus::parse(&status_str).ok_or_else(|| text_parse_failure(8, "job status"))?;

    let created_at_str: String = row.get(9)?;
    let sent_at_str: Option<String> = row.get(10)?;
    let completed_at_str: Option<String> = row.get(11)?;

    Ok(PrintJob {
        id,
        org_id: row.get(1)?,
        printer_id: row.get(2)?,
        agent_id: row.get(3)?,
        job_type,
        usb_device_id: row.get(5)?,
        zpl_data: row.get(6)?,
        copies: row.get(7)?,
        status,
        created_at: parse_timestamp(9, &created_at_str)?,
        sent_at: sent_at_str.as_deref().map(|s| parse_timestamp(10, s)).transpose()?,
        completed_at: completed_at_str
            .as_deref()
            .map(|s| parse_timestamp(11, s))
            .transpose()?,
        error_message: row.get(12)?,
    })
}

fn row_to_agent(row: &rusqlite::Row<'_>) -> rusqlite::Result<Agent> {
    let info_json: Option<String> = row.get(4)?;
    let last_seen_str: Option<String> = row.get(6)?;

    Ok(Agent {
        id: row.get(0)?,
        org_id: row.get(1)?,
        name: row.get(2)?,
        key_hash: row.get(3)?,
        workstation_info: info_json.and_then(|s| serde_json::from_str(&s).ok()),
        online: row.get(5)?,
        last_seen_at: last_seen_str
            .as_deref()
            .map(|s| parse_timestamp(6, s))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> PrintJob {
        PrintJob::new(
            "org-1",
            "prn-1",
            "agent-1",
            JobType::Sale,
            Some("usb-0".into()),
            "^XA^PQ1^FDtest^FS^XZ".into(),
            2,
        )
    }

    #[test]
    fn insert_and_retrieve_job() {
        let store = JobStore::open_in_memory().expect("open");
        let job = test_job();
        store.insert_job(&job).expect("insert");

        let loaded = store.get_job(&job.id).expect("get").expect("found");
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.status, JobStatus::Pending);
        assert_eq!(loaded.usb_device_id.as_deref(), Some("usb-0"));
        assert_eq!(loaded.copies, 2);
    }

    #[test]
    fn mark_sent_only_from_pending() {
        let store = JobStore::open_in_memory().expect("open");
        let job = test_job();
        store.insert_job(&job).expect("insert");

        assert!(store.mark_sent(&job.id).expect("first"));
        // Already sent — a second attempt must not re-apply.
        assert!(!store.mark_sent(&job.id).expect("second"));

        let loaded = store.get_job(&job.id).expect("get").expect("found");
        assert_eq!(loaded.status, JobStatus::Sent);
        assert!(loaded.sent_at.is_some());
    }

    #[test]
    fn result_transitions_sent_job_to_completed() {
        let store = JobStore::open_in_memory().expect("open");
        let job = test_job();
        store.insert_job(&job).expect("insert");
        store.mark_sent(&job.id).expect("sent");

        let outcome = store
            .record_result(&job.id, JobStatus::Completed, None)
            .expect("result");
        assert_eq!(outcome, ResultOutcome::Applied);

        let loaded = store.get_job(&job.id).expect("get").expect("found");
        assert_eq!(loaded.status, JobStatus::Completed);
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn duplicate_result_is_a_noop() {
        let store = JobStore::open_in_memory().expect("open");
        let job = test_job();
        store.insert_job(&job).expect("insert");
        store.mark_sent(&job.id).expect("sent");
        store
            .record_result(&job.id, JobStatus::Completed, None)
            .expect("first result");

        let first = store.get_job(&job.id).expect("get").expect("found");

        let outcome = store
            .record_result(&job.id, JobStatus::Failed, Some("late duplicate"))
            .expect("second result");
        assert_eq!(outcome, ResultOutcome::AlreadyTerminal);

        // Terminal state and timestamp untouched.
        let second = store.get_job(&job.id).expect("get").expect("found");
        assert_eq!(second.status, JobStatus::Completed);
        assert_eq!(second.completed_at, first.completed_at);
        assert!(second.error_message.is_none());
    }

    #[test]
    fn result_for_unknown_job_is_accepted() {
        let store = JobStore::open_in_memory().expect("open");
        let outcome = store
            .record_result(&JobId::new(), JobStatus::Completed, None)
            .expect("result");
        assert_eq!(outcome, ResultOutcome::UnknownJob);
    }

    #[test]
    fn non_terminal_result_is_rejected() {
        let store = JobStore::open_in_memory().expect("open");
        let result = store.record_result(&JobId::new(), JobStatus::Sent, None);
        assert!(matches!(result, Err(RelayError::Validation(_))));
    }

    #[test]
    fn terminal_job_cannot_be_marked_sent_again() {
        let store = JobStore::open_in_memory().expect("open");
        let job = test_job();
        store.insert_job(&job).expect("insert");
        store.mark_sent(&job.id).expect("sent");
        store
            .record_result(&job.id, JobStatus::Failed, Some("out of labels"))
            .expect("result");

        assert!(!store.mark_sent(&job.id).expect("mark sent"));
        let loaded = store.get_job(&job.id).expect("get").expect("found");
        assert_eq!(loaded.status, JobStatus::Failed);
    }

    #[test]
    fn pending_jobs_are_oldest_first_and_scoped() {
        let store = JobStore::open_in_memory().expect("open");

        let mut old = test_job();
        old.created_at = old.created_at - chrono::Duration::seconds(30);
        let new = test_job();
        let other_agent = PrintJob::new(
            "org-1",
            "prn-9",
            "agent-2",
            JobType::Batch,
            None,
            "^XA^XZ".into(),
            1,
        );
        let other_org = PrintJob::new(
            "org-2",
            "prn-1",
            "agent-1",
            JobType::Sale,
            None,
            "^XA^XZ".into(),
            1,
        );

        for job in [&old, &new, &other_agent, &other_org] {
            store.insert_job(job).expect("insert");
        }

        let pending = store
            .pending_jobs_for_agent("org-1", "agent-1", 10)
            .expect("pending");
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, old.id);
        assert_eq!(pending[1].id, new.id);
    }

    #[test]
    fn pending_jobs_respect_the_limit() {
        let store = JobStore::open_in_memory().expect("open");
        for _ in 0..5 {
            store.insert_job(&test_job()).expect("insert");
        }
        let pending = store
            .pending_jobs_for_agent("org-1", "agent-1", 3)
            .expect("pending");
        assert_eq!(pending.len(), 3);
    }

    #[test]
    fn jobs_survive_reopening_the_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs.db");

        let job = test_job();
        {
            let store = JobStore::open(&path).expect("open");
            store.insert_job(&job).expect("insert");
            store.mark_sent(&job.id).expect("sent");
        }

        let store = JobStore::open(&path).expect("reopen");
        let loaded = store.get_job(&job.id).expect("get").expect("found");
        assert_eq!(loaded.status, JobStatus::Sent);
        assert_eq!(loaded.zpl_data, job.zpl_data);
    }

    #[test]
    fn agent_lookup_by_key_hash() {
        let store = JobStore::open_in_memory().expect("open");
        let agent = Agent {
            id: "agent-1".into(),
            org_id: "org-1".into(),
            name: "Potting shed PC".into(),
            key_hash: "abc123".into(),
            workstation_info: None,
            online: false,
            last_seen_at: None,
        };
        store.upsert_agent(&agent).expect("upsert");

        let found = store.agent_by_key_hash("abc123").expect("query");
        assert_eq!(found.map(|a| a.id), Some("agent-1".into()));
        assert!(store.agent_by_key_hash("nope").expect("query").is_none());
    }

    #[test]
    fn touch_and_offline_flip_the_online_flag() {
        let store = JobStore::open_in_memory().expect("open");
        let agent = Agent {
            id: "agent-1".into(),
            org_id: "org-1".into(),
            name: "Potting shed PC".into(),
            key_hash: "abc123".into(),
            workstation_info: None,
            online: false,
            last_seen_at: None,
        };
        store.upsert_agent(&agent).expect("upsert");

        store.touch_agent("agent-1").expect("touch");
        let agent = store.get_agent("agent-1").expect("get").expect("found");
        assert!(agent.online);
        assert!(agent.last_seen_at.is_some());

        store.set_agent_offline("agent-1").expect("offline");
        let agent = store.get_agent("agent-1").expect("get").expect("found");
        assert!(!agent.online);
    }
}
