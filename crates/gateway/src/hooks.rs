// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook Ingestion (§4.H): a dual Unix-socket/TCP HTTP surface that the
//! per-agent hook scripts POST to. The Unix socket is trusted by filesystem
//! permissions; the TCP listener requires a bearer token.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Json, Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tokio::net::{TcpListener, UnixListener};
use tracing::{info, warn};

use crate::error::ErrorCode;
use crate::orchestrator::{GatewayError, HookOutcome, Orchestrator};
use crate::transport::auth::{constant_time_eq, extract_bearer};

/// Max hook body size (§5 resource limits).
const MAX_HOOK_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
struct HookState {
    orchestrator: Arc<Orchestrator>,
    token: Option<Arc<str>>,
    requires_auth: bool,
}

/// Serves hook ingestion. Binds the Unix socket unconditionally; a TCP bind
/// failure is logged and the socket keeps serving alone (§4.H).
pub async fn serve(orchestrator: Arc<Orchestrator>, bind_host: &str, hook_port: u16, socket_path: &std::path::Path) -> anyhow::Result<()> {
    let token: Option<Arc<str>> = orchestrator.hook_secret().map(Arc::from);

    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let unix_state = HookState {
        orchestrator: orchestrator.clone(),
        token: token.clone(),
        requires_auth: false,
    };
    let unix_listener = UnixListener::bind(socket_path)?;
    set_socket_permissions(socket_path)?;
    let unix_router = build_router(unix_state);
    let unix_task = tokio::spawn(async move {
        if let Err(err) = axum::serve(unix_listener, unix_router.into_make_service()).await {
            warn!(error = %err, "hook unix-socket listener exited");
        }
    });

    let tcp_state = HookState {
        orchestrator,
        token,
        requires_auth: true,
    };
    let addr = format!("{bind_host}:{hook_port}");
    match TcpListener::bind(&addr).await {
        Ok(listener) => {
            info!(%addr, "hook ingestion listening");
            let tcp_router = build_router(tcp_state);
            axum::serve(listener, tcp_router.into_make_service()).await?;
        }
        Err(err) => {
            warn!(%addr, error = %err, "hook TCP bind failed, serving socket only");
            unix_task.await.ok();
        }
    }
    Ok(())
}

fn set_socket_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

fn build_router(state: HookState) -> Router {
    Router::new()
        .route("/hook/{agent}/{endpoint}", post(hook_handler))
        .route("/notification", post(notification_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_HOOK_BODY_BYTES))
        .with_state(state)
}

fn authorized(state: &HookState, headers: &axum::http::HeaderMap) -> bool {
    if !state.requires_auth {
        return true;
    }
    let Some(expected) = &state.token else { return true };
    let header = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    match header.and_then(extract_bearer) {
        Some(token) => constant_time_eq(token, expected),
        None => false,
    }
}

async fn hook_handler(
    State(state): State<HookState>,
    Path((agent, endpoint)): Path<(String, String)>,
    headers: axum::http::HeaderMap,
    Json(raw): Json<Value>,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return error_response(ErrorCode::Unauthorized, "missing or invalid bearer token");
    }
    dispatch(&state, &agent, &endpoint, raw).await
}

/// Legacy route some older hook scripts still target: maps to the `claude`
/// adapter's `Notification` endpoint (§4.H).
async fn notification_handler(State(state): State<HookState>, headers: axum::http::HeaderMap, Json(raw): Json<Value>) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return error_response(ErrorCode::Unauthorized, "missing or invalid bearer token");
    }
    dispatch(&state, "claude", "Notification", raw).await
}

async fn dispatch(state: &HookState, agent: &str, endpoint: &str, raw: Value) -> axum::response::Response {
    match state.orchestrator.handle_hook_event(agent, endpoint, raw).await {
        Ok(HookOutcome::Ack) => Json(json!({ "ok": true })).into_response(),
        Ok(HookOutcome::Blocked(outcome)) => {
            Json(json!({ "ok": !outcome.blocked, "blocked": outcome.blocked, "reason": outcome.reason })).into_response()
        }
        Err(err) => gateway_error_response(&err),
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn error_response(code: ErrorCode, message: &str) -> axum::response::Response {
    let status = axum::http::StatusCode::from_u16(code.http_status()).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(code.body(message))).into_response()
}

fn gateway_error_response(err: &GatewayError) -> axum::response::Response {
    let status = axum::http::StatusCode::from_u16(err.code.http_status()).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.code.body(err.message.clone()))).into_response()
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
