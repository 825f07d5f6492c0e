// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data-model types shared across the store, session manager, and both
//! transports.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Risk level, totally ordered for trust-rule subsumption (`Safe < Moderate
/// < Dangerous`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Safe,
    Moderate,
    Dangerous,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Moderate => "moderate",
            Self::Dangerous => "dangerous",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "safe" => Some(Self::Safe),
            "moderate" => Some(Self::Moderate),
            "dangerous" => Some(Self::Dangerous),
            _ => None,
        }
    }
}

/// Session lifecycle status (§3, §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Running,
    Waiting,
    Error,
    Stopped,
    Done,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Stopped | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Error => "error",
            Self::Stopped => "stopped",
            Self::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "running" => Some(Self::Running),
            "waiting" => Some(Self::Waiting),
            "error" => Some(Self::Error),
            "stopped" => Some(Self::Stopped),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// One agent execution, as stored and as held in the Session Manager's table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub agent: String,
    pub agent_version: Option<String>,
    pub task: Option<String>,
    pub cwd: Option<String>,
    pub multiplexer_session_name: Option<String>,
    pub status: SessionStatus,
    pub auto_approve: bool,
    pub created_at: String,
    pub updated_at: String,
    pub finished_at: Option<String>,
    pub metadata: Value,

    /// In-memory only: the session's monotonic event sequence counter.
    #[serde(skip)]
    pub seq_counter: u64,
    /// In-memory only: last broadcast `message` text, for stop-event dedup.
    #[serde(skip)]
    pub last_broadcast_text: Option<String>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Append-only event log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub session_id: Uuid,
    pub seq: u64,
    pub event_type: String,
    pub payload: Value,
    pub created_at: String,
}

/// Resolution outcome of a [`PendingApproval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Approved,
    Denied,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }
}

/// A durable record that a permission request was asked (§3, §4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApproval {
    pub request_id: Uuid,
    pub session_id: Uuid,
    pub tool: String,
    pub target: String,
    pub risk: Risk,
    pub payload: Value,
    pub created_at: String,
    pub resolved_at: Option<String>,
    pub resolution: Option<Resolution>,
}

/// Auto-approval rule scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustScope {
    Session,
    Global,
}

/// An automation rule that resolves matching permission requests without a
/// human (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRule {
    pub id: i64,
    pub tool: String,
    pub target_pattern: Option<String>,
    pub risk_max: Risk,
    pub scope: TrustScope,
    pub session_id: Option<Uuid>,
    pub created_at: String,
}

/// The structured descriptor of a proposed tool call (§4.K.1.d).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionPayload {
    pub request_id: Uuid,
    pub tool_name: String,
    pub tool_category: String,
    pub tool_input: Value,
    pub risk_level: Risk,
    pub summary: String,
    pub diff: Option<crate::diff::Diff>,
    pub target: String,
    pub raw_payload: Value,
}

/// The unified, adapter-normalized shape every hook payload is mapped into
/// (§4.D).
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub kind: NormalizedKind,
    pub session_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Value,
    pub raw: Value,
    pub multiplexer_session_hint: Option<String>,
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedKind {
    PermissionRequest,
    ToolComplete,
    Notification,
    Stop,
    Error,
    Progress,
}

/// Internal fan-out message handed to each transport; every transport
/// wraps this into its own [`Envelope`] with its own monotonic `seq`
/// (§4.K `broadcastEvent`, §5 "same logical event, different transport-seq
/// values").
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    pub event_type: String,
    pub session_id: Option<Uuid>,
    pub payload: Value,
}

/// Outbound wire envelope (§6 Client WebSocket surface).
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub v: &'static str,
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub ts: String,
    #[serde(rename = "sessionId")]
    pub session_id: Option<Uuid>,
    pub payload: Value,
}

impl Envelope {
    pub fn new(seq: u64, event_type: impl Into<String>, session_id: Option<Uuid>, payload: Value) -> Self {
        Self {
            v: "1.0.0",
            seq,
            event_type: event_type.into(),
            ts: now_iso8601(),
            session_id,
            payload,
        }
    }
}

/// RFC 3339 / ISO-8601 UTC timestamp with a `Z` offset suffix.
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
