// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Manager (§4.F): the gateway-side session table, agent-id alias
//! map, sequence counters, and startup recovery. Generalizes the teacher's
//! single in-process session into a table of many, guarded by one
//! `parking_lot::Mutex` (read-heavy; fine-grained locks allowed but not
//! required at this budget, per §5).

use std::collections::HashMap;

use uuid::Uuid;

use crate::adapter::AdapterRegistry;
use crate::db::Store;
use crate::event::{Session, SessionStatus};
use crate::mux::MultiplexerDriver;

/// Hard cap on concurrent in-memory sessions (§5).
pub const MAX_SESSIONS: usize = 20;

struct Inner {
    sessions: HashMap<Uuid, Session>,
    alias: HashMap<String, Uuid>,
}

/// Owns the in-memory session table and alias map; all mutation goes
/// through this type (§3 Ownership).
pub struct SessionManager {
    inner: parking_lot::Mutex<Inner>,
    store: Store,
}

/// Outcome of a startup recovery pass (§4.F Recovery).
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryReport {
    pub restored: usize,
    pub cleaned: usize,
}

impl SessionManager {
    pub fn new(store: Store) -> Self {
        Self {
            inner: parking_lot::Mutex::new(Inner {
                sessions: HashMap::new(),
                alias: HashMap::new(),
            }),
            store,
        }
    }

    /// Allocate a new session: UUID, multiplexer-session name
    /// `<prefix>-<uuid-prefix>`, persisted with status `created` (§4.F
    /// Create). Rejects beyond [`MAX_SESSIONS`].
    pub async fn create(&self, agent: &str, task: Option<String>, cwd: Option<String>, adapters: &AdapterRegistry) -> anyhow::Result<Session> {
        {
            let inner = self.inner.lock();
            if inner.sessions.len() >= MAX_SESSIONS {
                anyhow::bail!("session cap of {MAX_SESSIONS} reached");
            }
        }

        let id = Uuid::new_v4();
        let prefix = adapters.get(agent).map(|a| a.session_prefix()).unwrap_or("ap");
        let short = id.simple().to_string();
        let mux_name = format!("{prefix}-{}", &short[..8.min(short.len())]);
        let now = crate::event::now_iso8601();

        let session = Session {
            id,
            agent: agent.to_string(),
            agent_version: None,
            task,
            cwd,
            multiplexer_session_name: Some(mux_name),
            status: SessionStatus::Created,
            auto_approve: false,
            created_at: now.clone(),
            updated_at: now,
            finished_at: None,
            metadata: serde_json::json!({}),
            seq_counter: 0,
            last_broadcast_text: None,
        };

        self.store.create_session(session.clone()).await?;
        self.inner.lock().sessions.insert(id, session.clone());
        Ok(session)
    }

    /// `get(id)` tries the direct key first, then the alias map (§4.F
    /// Lookup).
    pub fn get(&self, id_or_alias: &str) -> Option<Session> {
        let inner = self.inner.lock();
        if let Ok(id) = Uuid::parse_str(id_or_alias) {
            if let Some(session) = inner.sessions.get(&id) {
                return Some(session.clone());
            }
        }
        inner.alias.get(id_or_alias).and_then(|id| inner.sessions.get(id)).cloned()
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<Session> {
        self.inner.lock().sessions.get(&id).cloned()
    }

    /// Find the first active session for `agent`, used when a hook event
    /// carries no recognizable session id.
    pub fn find_active_by_agent(&self, agent: &str) -> Option<Session> {
        self.inner.lock().sessions.values().find(|s| s.agent == agent && s.is_active()).cloned()
    }

    pub fn list_active(&self) -> Vec<Session> {
        self.inner.lock().sessions.values().filter(|s| s.is_active()).cloned().collect()
    }

    pub fn list_all(&self) -> Vec<Session> {
        self.inner.lock().sessions.values().cloned().collect()
    }

    /// Record that `agent_session_id` (the agent's own idea of its session)
    /// maps to `gateway_id`, called on every hook event carrying one (§4.F).
    pub fn map_agent_session(&self, agent_session_id: &str, gateway_id: Uuid) {
        self.inner.lock().alias.insert(agent_session_id.to_string(), gateway_id);
    }

    /// Write-through status transition (§4.F Status transition). Terminal
    /// transitions keep the row in the table (callers filter via
    /// `is_active`/`list_active`) but the store records the finished time.
    pub async fn set_status(&self, id: Uuid, status: SessionStatus) -> anyhow::Result<()> {
        self.store.update_status(id, status).await?;
        let mut inner = self.inner.lock();
        if let Some(session) = inner.sessions.get_mut(&id) {
            session.status = status;
            session.updated_at = crate::event::now_iso8601();
            if status.is_terminal() {
                session.finished_at.get_or_insert_with(crate::event::now_iso8601);
            }
        }
        Ok(())
    }

    /// Update (and persist) the multiplexer session name on an existing
    /// handle (§4.K step 3). Write-through like [`Self::set_status`]: the
    /// store is updated before the in-memory table so a crash between the
    /// two still leaves recovery reading the new name.
    pub async fn set_multiplexer_name(&self, id: Uuid, name: String) -> anyhow::Result<()> {
        self.store.update_multiplexer_name(id, name.clone()).await?;
        let mut inner = self.inner.lock();
        if let Some(session) = inner.sessions.get_mut(&id) {
            session.multiplexer_session_name = Some(name);
        }
        Ok(())
    }

    /// `next_seq`: increments the in-memory counter, falling back to the
    /// store's `latest_seq + 1` if the handle is absent (§4.F Sequence
    /// counter — e.g. a post-restart insertion on a stopped session).
    pub async fn next_seq(&self, id: Uuid) -> anyhow::Result<u64> {
        let existing = {
            let mut inner = self.inner.lock();
            inner.sessions.get_mut(&id).map(|s| {
                s.seq_counter += 1;
                s.seq_counter
            })
        };
        match existing {
            Some(seq) => Ok(seq),
            None => Ok(self.store.latest_seq(id).await? + 1),
        }
    }

    pub fn set_last_broadcast_text(&self, id: Uuid, text: Option<String>) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.sessions.get_mut(&id) {
            session.last_broadcast_text = text;
        }
    }

    /// Startup recovery (§4.F Recovery): enumerate persisted non-terminal
    /// sessions and live multiplexer sessions; rehydrate handles whose
    /// multiplexer session is still alive, force the rest to `stopped`.
    pub async fn recover(&self, mux: &MultiplexerDriver, adapters: &AdapterRegistry) -> anyhow::Result<RecoveryReport> {
        let persisted = self.store.list_sessions(true).await?;
        let live_names: std::collections::HashSet<String> = mux.list_sessions().await.into_iter().collect();

        let mut report = RecoveryReport::default();
        for mut session in persisted {
            let alive = session
                .multiplexer_session_name
                .as_ref()
                .map(|name| live_names.contains(name))
                .unwrap_or(false);

            if alive {
                let _ = session
                    .multiplexer_session_name
                    .as_deref()
                    .and_then(|name| adapters.find_by_prefix(name));
                self.inner.lock().sessions.insert(session.id, session.clone());
                report.restored += 1;
            } else {
                self.store.update_status(session.id, SessionStatus::Stopped).await?;
                session.status = SessionStatus::Stopped;
                report.cleaned += 1;
            }
        }

        tracing::info!(restored = report.restored, cleaned = report.cleaned, "session recovery complete");
        Ok(report)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
