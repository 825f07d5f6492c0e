// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LAN Transport (§4.I): a local-filesystem socket (trusted, unauthenticated)
//! and a TCP socket (bearer-token gated) serving the same WebSocket + REST
//! surface, fed by the orchestrator's broadcast channel.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Json, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ErrorCode;
use crate::event::{BroadcastMessage, Envelope};
use crate::orchestrator::Orchestrator;
use crate::transport::auth::{constant_time_eq, extract_bearer};
use crate::transport::{Action, TransportSeq};

/// Hard cap on simultaneous LAN WebSocket clients (§5).
const MAX_LAN_CLIENTS: usize = 5;
const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15);

#[derive(Clone)]
struct LanState {
    orchestrator: Arc<Orchestrator>,
    token: Option<Arc<str>>,
    requires_auth: bool,
    client_count: Arc<AtomicUsize>,
    seq: Arc<TransportSeq>,
    shutdown: CancellationToken,
}

/// Serves the LAN transport. Binds the Unix socket unconditionally; the TCP
/// listener bind failure is logged as a warning and the socket keeps serving
/// alone (§4.H's "stale port tolerated" policy extended to this transport).
///
/// `shutdown` is watched by every open WebSocket connection so that on
/// cancellation each client gets a 1001-class close frame instead of the
/// connection just dying when the listener task is aborted (§5).
pub async fn serve(
    orchestrator: Arc<Orchestrator>,
    bind_host: &str,
    lan_port: u16,
    socket_path: &std::path::Path,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let token: Option<Arc<str>> = orchestrator.hook_secret().map(Arc::from);
    let client_count = Arc::new(AtomicUsize::new(0));
    let seq = Arc::new(TransportSeq::default());

    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let unix_state = LanState {
        orchestrator: orchestrator.clone(),
        token: token.clone(),
        requires_auth: false,
        client_count: client_count.clone(),
        seq: seq.clone(),
        shutdown: shutdown.clone(),
    };
    let unix_listener = UnixListener::bind(socket_path)?;
    set_socket_permissions(socket_path)?;
    let unix_router = build_router(unix_state);
    let unix_task = tokio::spawn(async move {
        if let Err(err) = axum::serve(unix_listener, unix_router.into_make_service()).await {
            warn!(error = %err, "LAN unix-socket listener exited");
        }
    });

    let tcp_state = LanState {
        orchestrator,
        token,
        requires_auth: true,
        client_count,
        seq,
        shutdown,
    };
    let addr = format!("{bind_host}:{lan_port}");
    match TcpListener::bind(&addr).await {
        Ok(listener) => {
            info!(%addr, "LAN transport listening");
            let tcp_router = build_router(tcp_state);
            axum::serve(listener, tcp_router.into_make_service()).await?;
        }
        Err(err) => {
            warn!(%addr, error = %err, "LAN TCP bind failed, serving socket only");
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

fn build_router(state: LanState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/approve", post(api_approve))
        .route("/api/deny", post(api_deny))
        .route("/api/health", get(api_health))
        .with_state(state)
}

async fn ws_handler(State(state): State<LanState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    if state.client_count.load(Ordering::SeqCst) >= MAX_LAN_CLIENTS {
        return axum::http::StatusCode::TOO_MANY_REQUESTS.into_response();
    }
    ws.on_upgrade(move |socket| handle_connection(state, socket)).into_response()
}

async fn handle_connection(state: LanState, socket: WebSocket) {
    state.client_count.fetch_add(1, Ordering::SeqCst);
    let authed = Arc::new(AtomicBool::new(!state.requires_auth));
    let (mut tx, mut rx) = socket.split();
    let mut broadcast_rx = state.orchestrator.subscribe();

    for msg in state.orchestrator.snapshot_for_new_client().await {
        if send_broadcast(&mut tx, &state.seq, msg).await.is_err() {
            state.client_count.fetch_sub(1, Ordering::SeqCst);
            return;
        }
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = tx.send(Message::Close(Some(axum::extract::ws::CloseFrame {
                    code: 1001,
                    reason: "Gateway shutting down".into(),
                }))).await;
                break;
            }
            _ = heartbeat.tick() => {
                let active = state.orchestrator.active_session_count();
                let msg = BroadcastMessage {
                    event_type: "heartbeat".to_owned(),
                    session_id: None,
                    payload: json!({"activeSessions": active}),
                };
                if send_broadcast(&mut tx, &state.seq, msg).await.is_err() {
                    break;
                }
            }
            event = broadcast_rx.recv() => {
                let event = match event {
                    Ok(e) => e,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                if send_broadcast(&mut tx, &state.seq, event).await.is_err() {
                    break;
                }
            }
            incoming = rx.next() => {
                let incoming = match incoming {
                    Some(Ok(m)) => m,
                    _ => break,
                };
                match incoming {
                    Message::Text(text) => {
                        if handle_client_text(&state, &text, &authed, &mut tx, &state.seq).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }
    state.client_count.fetch_sub(1, Ordering::SeqCst);
}

async fn handle_client_text(
    state: &LanState,
    text: &str,
    authed: &Arc<AtomicBool>,
    tx: &mut (impl SinkExt<Message> + Unpin),
    seq: &TransportSeq,
) -> Result<(), ()> {
    let action: Action = match serde_json::from_str(text) {
        Ok(a) => a,
        Err(_) => {
            return send_broadcast(
                tx,
                seq,
                protocol_error("malformed action payload"),
            )
            .await;
        }
    };

    if let Action::Auth { token } = &action {
        let ok = match &state.token {
            Some(expected) => constant_time_eq(token, expected),
            None => true,
        };
        if ok {
            authed.store(true, Ordering::SeqCst);
            return send_broadcast(
                tx,
                seq,
                BroadcastMessage { event_type: "auth_ok".to_owned(), session_id: None, payload: json!({}) },
            )
            .await;
        }
        return send_broadcast(tx, seq, protocol_error("invalid auth token")).await;
    }

    if state.requires_auth && !authed.load(Ordering::SeqCst) {
        return send_broadcast(tx, seq, protocol_error("not authenticated")).await;
    }

    if let Err(err) = state.orchestrator.handle_action(action).await {
        warn!(error = %err, "action handling failed");
        return send_broadcast(tx, seq, protocol_error(&err.to_string())).await;
    }
    Ok(())
}

fn protocol_error(message: &str) -> BroadcastMessage {
    BroadcastMessage {
        event_type: "error".to_owned(),
        session_id: None,
        payload: json!({"code": ErrorCode::ProtocolError.as_str(), "message": message}),
    }
}

async fn send_broadcast(
    tx: &mut (impl SinkExt<Message> + Unpin),
    seq: &TransportSeq,
    msg: BroadcastMessage,
) -> Result<(), ()> {
    let envelope = Envelope::new(seq.next(), msg.event_type, msg.session_id, msg.payload);
    let text = serde_json::to_string(&envelope).map_err(|_| ())?;
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

async fn api_approve(
    State(state): State<LanState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    api_action(state, &headers, "approve", body).await
}

async fn api_deny(
    State(state): State<LanState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    api_action(state, &headers, "deny", body).await
}

async fn api_action(state: LanState, headers: &HeaderMap, kind: &str, mut body: serde_json::Value) -> impl IntoResponse {
    if state.requires_auth {
        let presented = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        let authed = match &state.token {
            Some(expected) => check_bearer(presented, expected),
            None => true,
        };
        if !authed {
            return (axum::http::StatusCode::UNAUTHORIZED, Json(ErrorCode::Unauthorized.body("invalid or missing bearer token")))
                .into_response();
        }
    }
    if let Some(obj) = body.as_object_mut() {
        obj.insert("type".to_owned(), json!(kind));
    }
    let action: Action = match serde_json::from_value(body) {
        Ok(a) => a,
        Err(_) => {
            return (axum::http::StatusCode::BAD_REQUEST, Json(ErrorCode::MalformedPayload.body("invalid action body")))
                .into_response();
        }
    };
    match state.orchestrator.handle_action(action).await {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(err) => {
            (axum::http::StatusCode::BAD_REQUEST, Json(ErrorCode::Internal.body(err.to_string()))).into_response()
        }
    }
}

async fn api_health(State(state): State<LanState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "activeSessions": state.orchestrator.active_session_count(),
        "clients": state.client_count.load(Ordering::SeqCst),
    }))
}

/// Shared constant-time bearer check for both the WS auth action and the
/// REST endpoints.
fn check_bearer(header: Option<&str>, expected: &str) -> bool {
    match header.and_then(extract_bearer) {
        Some(token) => constant_time_eq(token, expected),
        None => false,
    }
}

#[cfg(test)]
#[path = "lan_tests.rs"]
mod tests;
