// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded ACID relational store (§4.A): WAL-mode SQLite with an FTS5
//! index over events kept in sync by triggers. `rusqlite::Connection` is
//! not `Send` across an `.await`, so every operation is dispatched through
//! `tokio::task::spawn_blocking`, the same "call synchronous I/O from async
//! handlers" texture the teacher's own file-backed event log uses.

mod schema;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use crate::event::{Event, PendingApproval, Resolution, Risk, Session, SessionStatus, TrustRule, TrustScope};

/// A fresh `TrustRule` to be inserted, before the store assigns it an id.
#[derive(Debug, Clone)]
pub struct NewTrustRule {
    pub tool: String,
    pub target_pattern: Option<String>,
    pub risk_max: Risk,
    pub scope: TrustScope,
    pub session_id: Option<Uuid>,
}

/// Handle to the embedded store. Cheaply cloneable; all clones share the
/// same connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let result = tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await?;
        Ok(result?)
    }

    pub async fn create_session(&self, session: Session) -> anyhow::Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, agent, agent_version, task, cwd, multiplexer_session_name, status, auto_approve, created_at, updated_at, finished_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    session.id.to_string(),
                    session.agent,
                    session.agent_version,
                    session.task,
                    session.cwd,
                    session.multiplexer_session_name,
                    session.status.as_str(),
                    session.auto_approve as i64,
                    session.created_at,
                    session.updated_at,
                    session.finished_at,
                    session.metadata.to_string(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, id: Uuid) -> anyhow::Result<Option<Session>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, agent, agent_version, task, cwd, multiplexer_session_name, status, auto_approve, created_at, updated_at, finished_at, metadata
                 FROM sessions WHERE id = ?1",
                params![id.to_string()],
                row_to_session,
            )
            .optional()
        })
        .await
    }

    pub async fn list_sessions(&self, active_only: bool) -> anyhow::Result<Vec<Session>> {
        self.with_conn(move |conn| {
            let sql = if active_only {
                "SELECT id, agent, agent_version, task, cwd, multiplexer_session_name, status, auto_approve, created_at, updated_at, finished_at, metadata
                 FROM sessions WHERE status NOT IN ('done','stopped','error') ORDER BY created_at"
            } else {
                "SELECT id, agent, agent_version, task, cwd, multiplexer_session_name, status, auto_approve, created_at, updated_at, finished_at, metadata
                 FROM sessions ORDER BY created_at"
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], row_to_session)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    pub async fn update_status(&self, id: Uuid, new_status: SessionStatus) -> anyhow::Result<()> {
        let now = crate::event::now_iso8601();
        self.with_conn(move |conn| {
            if new_status.is_terminal() {
                conn.execute(
                    "UPDATE sessions SET status = ?1, updated_at = ?2, finished_at = COALESCE(finished_at, ?2) WHERE id = ?3",
                    params![new_status.as_str(), now, id.to_string()],
                )?;
            } else {
                conn.execute(
                    "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![new_status.as_str(), now, id.to_string()],
                )?;
            }
            Ok(())
        })
        .await
    }

    pub async fn update_multiplexer_name(&self, id: Uuid, name: String) -> anyhow::Result<()> {
        let now = crate::event::now_iso8601();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE sessions SET multiplexer_session_name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, now, id.to_string()],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn insert_event(&self, session_id: Uuid, seq: u64, event_type: String, payload: Value) -> anyhow::Result<i64> {
        let created_at = crate::event::now_iso8601();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO events (session_id, seq, event_type, payload, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![session_id.to_string(), seq as i64, event_type, payload.to_string(), created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn events_since(&self, session_id: Uuid, after_seq: u64, limit: u32) -> anyhow::Result<Vec<Event>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, seq, event_type, payload, created_at FROM events
                 WHERE session_id = ?1 AND seq > ?2 ORDER BY seq ASC LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![session_id.to_string(), after_seq as i64, limit], row_to_event)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    pub async fn latest_seq(&self, session_id: Uuid) -> anyhow::Result<u64> {
        self.with_conn(move |conn| {
            let seq: Option<i64> = conn
                .query_row("SELECT MAX(seq) FROM events WHERE session_id = ?1", params![session_id.to_string()], |row| row.get(0))
                .optional()?
                .flatten();
            Ok(seq.unwrap_or(0) as u64)
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_pending(&self, request_id: Uuid, session_id: Uuid, tool: String, target: String, risk: Risk, payload: Value) -> anyhow::Result<()> {
        let created_at = crate::event::now_iso8601();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO pending_approvals (request_id, session_id, tool, target, risk, payload, created_at, resolved_at, resolution)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL)",
                params![request_id.to_string(), session_id.to_string(), tool, target, risk.as_str(), payload.to_string(), created_at],
            )?;
            Ok(())
        })
        .await
    }

    /// Only returns a row when it is still unresolved.
    pub async fn get_pending(&self, request_id: Uuid) -> anyhow::Result<Option<PendingApproval>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT request_id, session_id, tool, target, risk, payload, created_at, resolved_at, resolution
                 FROM pending_approvals WHERE request_id = ?1 AND resolution IS NULL",
                params![request_id.to_string()],
                row_to_pending,
            )
            .optional()
        })
        .await
    }

    pub async fn pending_for_session(&self, session_id: Uuid) -> anyhow::Result<Vec<PendingApproval>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT request_id, session_id, tool, target, risk, payload, created_at, resolved_at, resolution
                 FROM pending_approvals WHERE session_id = ?1 AND resolution IS NULL ORDER BY created_at",
            )?;
            let rows = stmt.query_map(params![session_id.to_string()], row_to_pending)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    pub async fn resolve_pending(&self, request_id: Uuid, resolution: Resolution) -> anyhow::Result<bool> {
        let resolved_at = crate::event::now_iso8601();
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE pending_approvals SET resolution = ?1, resolved_at = ?2 WHERE request_id = ?3 AND resolution IS NULL",
                params![resolution.as_str(), resolved_at, request_id.to_string()],
            )?;
            Ok(updated > 0)
        })
        .await
    }

    pub async fn count_pending_unresolved(&self, session_id: Uuid) -> anyhow::Result<u32> {
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM pending_approvals WHERE session_id = ?1 AND resolution IS NULL",
                params![session_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as u32)
        })
        .await
    }

    pub async fn add_trust_rule(&self, rule: NewTrustRule) -> anyhow::Result<i64> {
        let created_at = crate::event::now_iso8601();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO trust_rules (tool, target_pattern, risk_max, scope, session_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    rule.tool,
                    rule.target_pattern,
                    rule.risk_max.as_str(),
                    match rule.scope {
                        TrustScope::Session => "session",
                        TrustScope::Global => "global",
                    },
                    rule.session_id.map(|s| s.to_string()),
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Evaluate trust rules per §3: session-scoped rules considered before
    /// global, first match wins.
    pub async fn check_trust_rule(&self, tool: String, target: String, risk: Risk, session_id: Uuid) -> anyhow::Result<bool> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT tool, target_pattern, risk_max, scope, session_id FROM trust_rules
                 WHERE tool = ?1 AND (scope = 'global' OR session_id = ?2)
                 ORDER BY CASE scope WHEN 'session' THEN 0 ELSE 1 END, id",
            )?;
            let mut rows = stmt.query(params![tool, session_id.to_string()])?;
            while let Some(row) = rows.next()? {
                let target_pattern: Option<String> = row.get(1)?;
                let risk_max_str: String = row.get(2)?;
                let Some(risk_max) = Risk::from_str(&risk_max_str) else { continue };
                if risk > risk_max {
                    continue;
                }
                if let Some(pattern) = &target_pattern {
                    match Regex::new(pattern) {
                        Ok(re) if re.is_match(&target) => return Ok(true),
                        Ok(_) => continue,
                        Err(_) => continue,
                    }
                }
                return Ok(true);
            }
            Ok(false)
        })
        .await
    }

    pub async fn clear_session_trust_rules(&self, session_id: Uuid) -> anyhow::Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM trust_rules WHERE session_id = ?1", params![session_id.to_string()])?;
            Ok(())
        })
        .await
    }

    /// Flush the WAL back into the main database file (§5 graceful
    /// shutdown: "flush and close the store"). `rusqlite::Connection::close`
    /// needs to consume the connection, which isn't possible through the
    /// shared handle, so this checkpoints instead — the durable state a
    /// later `open` would see is identical either way.
    pub async fn close(&self) -> anyhow::Result<()> {
        self.with_conn(|conn| conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(())).map_err(Into::into))
            .await
    }

    /// Full-text search over events; `query` is quoted verbatim to avoid
    /// FTS5 query-operator interpretation (§4.A).
    pub async fn search_events(&self, query: String, session_id: Option<Uuid>) -> anyhow::Result<Vec<Event>> {
        self.with_conn(move |conn| {
            let quoted = format!("\"{}\"", query.replace('"', "\"\""));
            let mut stmt = conn.prepare(
                "SELECT e.id, e.session_id, e.seq, e.event_type, e.payload, e.created_at
                 FROM events_fts f JOIN events e ON e.id = f.rowid
                 WHERE events_fts MATCH ?1 AND (?2 IS NULL OR e.session_id = ?2)
                 ORDER BY e.seq",
            )?;
            let session_filter = session_id.map(|s| s.to_string());
            let rows = stmt.query_map(params![quoted, session_filter], row_to_event)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    let id: String = row.get(0)?;
    let status: String = row.get(6)?;
    let auto_approve: i64 = row.get(7)?;
    let metadata: String = row.get(11)?;
    Ok(Session {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
        agent: row.get(1)?,
        agent_version: row.get(2)?,
        task: row.get(3)?,
        cwd: row.get(4)?,
        multiplexer_session_name: row.get(5)?,
        status: SessionStatus::from_str(&status).unwrap_or(SessionStatus::Error),
        auto_approve: auto_approve != 0,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        finished_at: row.get(10)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
        seq_counter: 0,
        last_broadcast_text: None,
    })
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
    let session_id: String = row.get(1)?;
    let seq: i64 = row.get(2)?;
    let payload: String = row.get(4)?;
    Ok(Event {
        id: row.get(0)?,
        session_id: Uuid::parse_str(&session_id).unwrap_or_else(|_| Uuid::nil()),
        seq: seq as u64,
        event_type: row.get(3)?,
        payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
        created_at: row.get(5)?,
    })
}

fn row_to_pending(row: &rusqlite::Row) -> rusqlite::Result<PendingApproval> {
    let request_id: String = row.get(0)?;
    let session_id: String = row.get(1)?;
    let risk: String = row.get(4)?;
    let payload: String = row.get(5)?;
    let resolution: Option<String> = row.get(8)?;
    Ok(PendingApproval {
        request_id: Uuid::parse_str(&request_id).unwrap_or_else(|_| Uuid::nil()),
        session_id: Uuid::parse_str(&session_id).unwrap_or_else(|_| Uuid::nil()),
        tool: row.get(2)?,
        target: row.get(3)?,
        risk: Risk::from_str(&risk).unwrap_or(Risk::Moderate),
        payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
        created_at: row.get(6)?,
        resolved_at: row.get(7)?,
        resolution: resolution.and_then(|r| match r.as_str() {
            "approved" => Some(Resolution::Approved),
            "denied" => Some(Resolution::Denied),
            _ => None,
        }),
    })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
