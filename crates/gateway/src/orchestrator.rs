// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway Orchestrator (§4.K): wires the store, session manager,
//! multiplexer driver, adapter registry, and approval blocker together and
//! owns the hook-event and client-action flows. Both transports hold an
//! `Arc<Orchestrator>` and drive it; it holds no transport-specific state.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::adapter::AdapterRegistry;
use crate::approval::{ApprovalBlocker, ApprovalOutcome};
use crate::config::Config;
use crate::db::{NewTrustRule, Store};
use crate::diff;
use crate::error::ErrorCode;
use crate::event::{BroadcastMessage, NormalizedEvent, NormalizedKind, Resolution, Risk, Session, SessionStatus, TrustScope};
use crate::mux::MultiplexerDriver;
use crate::session::SessionManager;
use crate::transport::Action;

/// Max diff payload size (§5 resource limits).
const MAX_DIFF_BYTES: usize = 256 * 1024;
/// "Undo window" before a dangerous approval is actually committed (§4.K
/// client-action flow, spec.md example 2).
const UNDO_WINDOW: Duration = Duration::from_secs(2);
/// Lines of multiplexer pane scanned for agent-text extraction (§4.K.2).
const PANE_SCAN_LINES: u32 = 200;

/// Result of a hook's blocking/non-blocking dispatch (§4.H step 5/6).
pub enum HookOutcome {
    Blocked(ApprovalOutcome),
    Ack,
}

/// Error surfaced to the hook HTTP layer; carries the wire error code so the
/// handler can set the right HTTP status (§6).
#[derive(Debug)]
pub struct GatewayError {
    pub code: ErrorCode,
    pub message: String,
}

impl GatewayError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

pub struct Orchestrator {
    config: Config,
    store: Store,
    sessions: SessionManager,
    mux: MultiplexerDriver,
    adapters: AdapterRegistry,
    blocker: Arc<ApprovalBlocker>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl Orchestrator {
    pub fn new(config: Config, store: Store, sessions: SessionManager, mux: MultiplexerDriver, adapters: AdapterRegistry) -> Arc<Self> {
        let (broadcast_tx, _rx) = broadcast::channel(1024);
        Arc::new(Self {
            config,
            store,
            sessions,
            mux,
            adapters,
            blocker: ApprovalBlocker::new(),
            broadcast_tx,
        })
    }

    pub fn hook_secret(&self) -> Option<String> {
        self.config.hook_secret.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.broadcast_tx.subscribe()
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.list_active().len()
    }

    /// Graceful-shutdown hook (§5): deny every still-pending approval so no
    /// hook is left blocked past process exit, and flush/close the store.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.blocker.deny_all("Gateway shutting down");
        self.store.close().await
    }

    /// Startup recovery pass (§4.F Recovery), run once before transports
    /// start accepting traffic.
    pub async fn recover(&self) -> anyhow::Result<crate::session::RecoveryReport> {
        self.sessions.recover(&self.mux, &self.adapters).await
    }

    /// New-client state dump (§4.I "New-client state dump"): a
    /// `session_list`, then per active session a `session_start`, then one
    /// `permission_request` per still-unresolved pending approval.
    pub async fn snapshot_for_new_client(&self) -> Vec<BroadcastMessage> {
        let active = self.sessions.list_active();
        let mut messages = vec![BroadcastMessage {
            event_type: "session_list".to_owned(),
            session_id: None,
            payload: json!({ "sessions": active }),
        }];

        for session in &active {
            messages.push(BroadcastMessage {
                event_type: "session_start".to_owned(),
                session_id: Some(session.id),
                payload: serde_json::to_value(session).unwrap_or(Value::Null),
            });

            if let Ok(pending) = self.store.pending_for_session(session.id).await {
                for p in pending {
                    messages.push(BroadcastMessage {
                        event_type: "permission_request".to_owned(),
                        session_id: Some(session.id),
                        payload: p.payload,
                    });
                }
            }
        }
        messages
    }

    /// Allocate a seq, persist, and fan out to both transports
    /// (`broadcastEvent`, §4.K).
    async fn broadcast_event(&self, event_type: &str, payload: Value, session_id: Option<Uuid>) -> anyhow::Result<u64> {
        let seq = match session_id {
            Some(id) => self.sessions.next_seq(id).await?,
            None => 0,
        };
        if let Some(id) = session_id {
            self.store.insert_event(id, seq, event_type.to_owned(), payload.clone()).await?;
        }
        let _ = self.broadcast_tx.send(BroadcastMessage {
            event_type: event_type.to_owned(),
            session_id,
            payload,
        });
        Ok(seq)
    }

    // ---- Hook event flow (§4.K) -----------------------------------------

    pub async fn handle_hook_event(&self, agent: &str, endpoint: &str, raw: Value) -> Result<HookOutcome, GatewayError> {
        let adapter = self
            .adapters
            .get(agent)
            .ok_or_else(|| GatewayError::new(ErrorCode::UnknownAgent, format!("unknown agent: {agent}")))?;

        let normalized = adapter
            .normalize_hook_payload(&raw, endpoint)
            .ok_or_else(|| GatewayError::new(ErrorCode::MalformedPayload, "unrecognized hook payload"))?;

        let session = self.resolve_session(agent, &normalized).await.map_err(internal)?;

        match normalized.kind {
            NormalizedKind::PermissionRequest => self.handle_permission_request(agent, &session, normalized).await,
            NormalizedKind::ToolComplete => {
                self.broadcast_event("tool_complete", normalized.raw.clone(), Some(session.id))
                    .await
                    .map_err(internal)?;
                Ok(HookOutcome::Ack)
            }
            NormalizedKind::Notification => {
                // tool-completion echoes are suppressed in favor of tool_complete (§4.K).
                Ok(HookOutcome::Ack)
            }
            NormalizedKind::Stop => {
                self.handle_stop(agent, &session).await.map_err(internal)?;
                Ok(HookOutcome::Ack)
            }
            NormalizedKind::Error => {
                self.broadcast_event("error", normalized.raw.clone(), Some(session.id))
                    .await
                    .map_err(internal)?;
                Ok(HookOutcome::Ack)
            }
            NormalizedKind::Progress => Ok(HookOutcome::Ack),
        }
    }

    async fn resolve_session(&self, agent: &str, normalized: &NormalizedEvent) -> anyhow::Result<Session> {
        let existing = normalized.session_id.as_deref().and_then(|id| self.sessions.get(id));
        let session = match existing {
            Some(session) => session,
            None => match self.sessions.find_active_by_agent(agent) {
                Some(session) => session,
                None => {
                    let session = self.sessions.create(agent, None, normalized.cwd.clone(), &self.adapters).await?;
                    self.broadcast_event("session_start", serde_json::to_value(&session)?, Some(session.id)).await?;
                    session
                }
            },
        };

        if let Some(agent_session_id) = &normalized.session_id {
            self.sessions.map_agent_session(agent_session_id, session.id);
        }

        if let Some(hint) = &normalized.multiplexer_session_hint {
            if session.multiplexer_session_name.as_deref() != Some(hint.as_str()) {
                self.sessions.set_multiplexer_name(session.id, hint.clone()).await?;
            }
        }

        Ok(session)
    }

    /// §4.K.1 Permission-request subflow.
    async fn handle_permission_request(
        &self,
        agent: &str,
        session: &Session,
        normalized: NormalizedEvent,
    ) -> Result<HookOutcome, GatewayError> {
        let adapter = self
            .adapters
            .get(agent)
            .ok_or_else(|| GatewayError::new(ErrorCode::UnknownAgent, format!("unknown agent: {agent}")))?;
        let tool_name = normalized.tool_name.clone().unwrap_or_default();

        // a. "ask user a question" special case.
        if adapter.is_question_tool(&tool_name) {
            let questions = normalized.tool_input.get("questions").cloned().unwrap_or(Value::Null);
            self.broadcast_event("user_question", json!({ "questions": questions }), Some(session.id))
                .await
                .map_err(internal)?;
            self.sessions.set_status(session.id, SessionStatus::Waiting).await.map_err(internal)?;
            return Ok(HookOutcome::Ack);
        }

        let mut payload = adapter
            .extract_permission(&normalized.raw)
            .ok_or_else(|| GatewayError::new(ErrorCode::MalformedPayload, "unrecognized permission payload"))?;
        payload.request_id = Uuid::new_v4();
        payload.diff = diff::generate_diff(&payload.tool_name, &payload.tool_input, MAX_DIFF_BYTES);
        let risk = payload.risk_level;
        let target = payload.target.clone();
        let request_id = payload.request_id;

        // b. auto-approve-safe fast path.
        if self.config.auto_approve_safe && risk == Risk::Safe {
            return Ok(HookOutcome::Blocked(ApprovalOutcome { blocked: false, reason: None }));
        }

        // c. trust-rule fast path.
        let trusted = self
            .store
            .check_trust_rule(tool_name.clone(), target.clone(), risk, session.id)
            .await
            .map_err(internal)?;
        if trusted {
            return Ok(HookOutcome::Blocked(ApprovalOutcome { blocked: false, reason: None }));
        }

        // d. persist + broadcast.
        let payload_value = serde_json::to_value(&payload).map_err(internal)?;
        self.store
            .create_pending(request_id, session.id, tool_name.clone(), target.clone(), risk, payload_value.clone())
            .await
            .map_err(internal)?;
        self.sessions.set_status(session.id, SessionStatus::Waiting).await.map_err(internal)?;
        self.broadcast_event("permission_request", payload_value, Some(session.id))
            .await
            .map_err(internal)?;

        // e/f. register + await, resolving via G exactly once.
        let timeout = Duration::from_millis(self.config.approval_timeout_ms);
        let outcome = self.await_with_cancellation_guard(request_id, session.id, timeout).await;

        let resolution = if outcome.blocked { Resolution::Denied } else { Resolution::Approved };
        self.store.resolve_pending(request_id, resolution).await.map_err(internal)?;
        if !outcome.blocked {
            self.sessions.set_status(session.id, SessionStatus::Running).await.map_err(internal)?;
        }
        Ok(HookOutcome::Blocked(outcome))
    }

    /// Wraps [`ApprovalBlocker::wait_for_approval`] with a guard that denies
    /// the request with "Hook connection lost" if this future is dropped
    /// before resolution — e.g. the hook's HTTP connection closed (§4.G
    /// Cancellation propagation, §4.H step 5).
    async fn await_with_cancellation_guard(&self, request_id: Uuid, session_id: Uuid, timeout: Duration) -> ApprovalOutcome {
        struct CancelGuard<'a> {
            blocker: &'a ApprovalBlocker,
            request_id: Uuid,
        }
        impl Drop for CancelGuard<'_> {
            fn drop(&mut self) {
                if self.blocker.is_pending(self.request_id) {
                    tracing::warn!(request_id = %self.request_id, "hook connection lost before approval resolved");
                    self.blocker.deny(self.request_id, Some("Hook connection lost".to_owned()));
                }
            }
        }

        let _guard = CancelGuard { blocker: &self.blocker, request_id };
        self.blocker.wait_for_approval(request_id, session_id, timeout).await
    }

    async fn handle_stop(&self, agent: &str, session: &Session) -> anyhow::Result<()> {
        self.sessions.set_status(session.id, SessionStatus::Running).await?;
        self.blocker.cancel_session(session.id);

        if let Some(name) = &session.multiplexer_session_name {
            if let Some(pane) = self.mux.capture_pane(name, PANE_SCAN_LINES).await {
                if let Some(adapter) = self.adapters.get(agent) {
                    if let Some(text) = extract_agent_text(&pane, adapter.response_marker()) {
                        if session.last_broadcast_text.as_deref() != Some(text.as_str()) {
                            self.sessions.set_last_broadcast_text(session.id, Some(text.clone()));
                            self.broadcast_event("message", json!({ "text": text }), Some(session.id)).await?;
                        }
                    }
                }
            }
        }

        self.broadcast_event("session_update", serde_json::to_value(session)?, Some(session.id)).await?;
        Ok(())
    }

    // ---- Client-action flow (§4.K) --------------------------------------

    pub async fn handle_action(&self, action: Action) -> anyhow::Result<()> {
        match action {
            Action::Approve { request_id, scope } => self.do_approve(request_id, scope).await,
            Action::Deny { request_id, reason } => {
                self.blocker.deny(request_id, reason);
                Ok(())
            }
            Action::EditApprove { request_id, new_input: _ } => {
                // Minimum-accept, mirroring resume_from_seq (§4.K, §9 Open Questions).
                self.blocker.approve(request_id);
                Ok(())
            }
            Action::BatchApprove { request_ids } => {
                for id in request_ids {
                    self.blocker.approve(id);
                }
                Ok(())
            }
            Action::TextInput { session_id, text } | Action::TerminalInput { session_id, text } => {
                self.send_text(session_id, &text).await
            }
            Action::Stop { session_id, force } => self.do_stop(session_id, force.unwrap_or(false)).await,
            Action::Pause {} => self.do_pause().await,
            Action::StartSession { agent, task, cwd } => self.do_start_session(agent, task, cwd).await,
            Action::ResumeFromSeq { .. } => Ok(()),
            Action::Auth { .. } => Ok(()),
        }
    }

    async fn do_approve(&self, request_id: Uuid, scope: Option<String>) -> anyhow::Result<()> {
        let pending = self.store.get_pending(request_id).await?;
        let dangerous = pending.as_ref().map(|p| p.risk == Risk::Dangerous).unwrap_or(false);

        if dangerous {
            tokio::time::sleep(UNDO_WINDOW).await;
            if !self.blocker.is_pending(request_id) {
                return Ok(());
            }
        }
        self.blocker.approve(request_id);

        if let (Some(pending), Some(scope)) = (pending, scope) {
            if scope != "once" {
                let trust_scope = if scope == "global" { TrustScope::Global } else { TrustScope::Session };
                let rule = NewTrustRule {
                    tool: pending.tool,
                    target_pattern: None,
                    risk_max: pending.risk,
                    scope: trust_scope,
                    session_id: if matches!(trust_scope, TrustScope::Global) { None } else { Some(pending.session_id) },
                };
                self.store.add_trust_rule(rule).await?;
            }
        }
        Ok(())
    }

    async fn send_text(&self, session_id: Option<Uuid>, text: &str) -> anyhow::Result<()> {
        let session = match session_id {
            Some(id) => self.sessions.get_by_id(id),
            None => self.sessions.list_active().into_iter().next(),
        };
        if let Some(session) = session {
            if let Some(name) = &session.multiplexer_session_name {
                self.mux.send_keys(name, text).await;
            }
        }
        Ok(())
    }

    async fn do_stop(&self, session_id: Option<Uuid>, force: bool) -> anyhow::Result<()> {
        let targets = match session_id {
            Some(id) => self.sessions.get_by_id(id).into_iter().collect::<Vec<_>>(),
            None => self.sessions.list_active(),
        };
        for session in targets {
            if let Some(name) = &session.multiplexer_session_name {
                if force {
                    self.mux.kill_session(name).await;
                } else {
                    self.mux.send_keys(name, "/exit").await;
                }
            }
            self.blocker.cancel_session(session.id);
            self.sessions.set_status(session.id, SessionStatus::Stopped).await?;
            self.broadcast_event("session_end", serde_json::to_value(&session)?, Some(session.id)).await?;
        }
        Ok(())
    }

    async fn do_pause(&self) -> anyhow::Result<()> {
        for session in self.sessions.list_active() {
            if let Some(name) = &session.multiplexer_session_name {
                self.mux.send_interrupt(name).await;
            }
        }
        Ok(())
    }

    async fn do_start_session(&self, agent: String, task: Option<String>, cwd: Option<String>) -> anyhow::Result<()> {
        let argv = {
            let adapter = self
                .adapters
                .get(&agent)
                .ok_or_else(|| anyhow::anyhow!("unknown agent: {agent}"))?;
            adapter.build_launch_command(task.as_deref().unwrap_or(""), &[])
        };

        let session = self.sessions.create(&agent, task, cwd.clone(), &self.adapters).await?;
        let working_dir = cwd.unwrap_or_else(|| ".".to_owned());
        let name = session.multiplexer_session_name.clone().unwrap_or_default();

        if self.mux.create_session(&name, &argv, &working_dir).await {
            self.sessions.set_status(session.id, SessionStatus::Running).await?;
            self.broadcast_event("session_start", serde_json::to_value(&session)?, Some(session.id)).await?;
        } else {
            self.sessions.set_status(session.id, SessionStatus::Error).await?;
            self.broadcast_event(
                "error",
                json!({ "code": ErrorCode::Internal.as_str(), "message": "failed to launch multiplexer session" }),
                Some(session.id),
            )
            .await?;
        }
        Ok(())
    }
}

fn internal<E: std::fmt::Display>(err: E) -> GatewayError {
    GatewayError::new(ErrorCode::Internal, err.to_string())
}

/// §4.K.2 Agent-text extraction: scan captured pane text for the agent's
/// response marker and collect lines until the next blank trailer, dropping
/// internal tool-marker lines.
fn extract_agent_text(pane: &str, marker: &str) -> Option<String> {
    let lines: Vec<&str> = pane.lines().collect();
    let start = lines.iter().rposition(|line| line.trim_start().starts_with(marker))?;

    let mut collected = Vec::new();
    for line in &lines[start..] {
        let stripped = line.trim_start().trim_start_matches(marker).trim();
        if stripped.is_empty() && !collected.is_empty() {
            break;
        }
        if stripped.starts_with("Tool:") || stripped.starts_with("Running:") {
            break;
        }
        if !stripped.is_empty() {
            collected.push(stripped);
        }
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join(" "))
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
