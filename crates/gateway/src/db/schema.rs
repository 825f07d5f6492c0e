// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent schema initialization and `PRAGMA user_version`-tracked
//! migrations (§4.A: "schema init is idempotent").

use rusqlite::Connection;

const CURRENT_VERSION: i64 = 1;

pub fn init(conn: &Connection) -> anyhow::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < 1 {
        apply_v1(conn)?;
        conn.pragma_update(None, "user_version", CURRENT_VERSION)?;
    }
    Ok(())
}

fn apply_v1(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            agent TEXT NOT NULL,
            agent_version TEXT,
            task TEXT,
            cwd TEXT,
            multiplexer_session_name TEXT,
            status TEXT NOT NULL,
            auto_approve INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            finished_at TEXT,
            metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(session_id, seq)
        );
        CREATE INDEX IF NOT EXISTS idx_events_session_seq ON events(session_id, seq);

        CREATE VIRTUAL TABLE IF NOT EXISTS events_fts USING fts5(
            event_type, payload, content='events', content_rowid='id'
        );

        CREATE TRIGGER IF NOT EXISTS events_fts_ai AFTER INSERT ON events BEGIN
            INSERT INTO events_fts(rowid, event_type, payload) VALUES (new.id, new.event_type, new.payload);
        END;
        CREATE TRIGGER IF NOT EXISTS events_fts_ad AFTER DELETE ON events BEGIN
            INSERT INTO events_fts(events_fts, rowid, event_type, payload) VALUES ('delete', old.id, old.event_type, old.payload);
        END;
        CREATE TRIGGER IF NOT EXISTS events_fts_au AFTER UPDATE ON events BEGIN
            INSERT INTO events_fts(events_fts, rowid, event_type, payload) VALUES ('delete', old.id, old.event_type, old.payload);
            INSERT INTO events_fts(rowid, event_type, payload) VALUES (new.id, new.event_type, new.payload);
        END;

        CREATE TABLE IF NOT EXISTS pending_approvals (
            request_id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            tool TEXT NOT NULL,
            target TEXT NOT NULL,
            risk TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            resolved_at TEXT,
            resolution TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_pending_session ON pending_approvals(session_id);
        CREATE INDEX IF NOT EXISTS idx_pending_unresolved ON pending_approvals(session_id) WHERE resolution IS NULL;

        CREATE TABLE IF NOT EXISTS trust_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tool TEXT NOT NULL,
            target_pattern TEXT,
            risk_max TEXT NOT NULL,
            scope TEXT NOT NULL,
            session_id TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_trust_rules_tool ON trust_rules(tool);
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
