use axum::http::{HeaderMap, HeaderValue};

use super::*;

fn state_with_auth(required: bool, token: Option<&str>) -> HookState {
    HookState {
        orchestrator: test_orchestrator(),
        token: token.map(Arc::from),
        requires_auth: required,
    }
}

fn test_orchestrator() -> Arc<Orchestrator> {
    let store = crate::db::Store::open_in_memory().expect("in-memory store");
    let sessions = crate::session::SessionManager::new(store.clone());
    let adapters = crate::adapter::AdapterRegistry::with_builtin_adapters();
    let mux = crate::mux::MultiplexerDriver::default();
    let config = crate::config::Config {
        data_dir: None,
        hook_port: 4317,
        hook_secret: Some("hook-secret".to_owned()),
        bind_host: "127.0.0.1".into(),
        lan_port: 4318,
        auto_approve_safe: false,
        approval_timeout_ms: 300_000,
        relay_url: None,
        relay_token: None,
        relay_e2e: false,
        relay_peer_key: None,
        log_level: "info".into(),
        log_format: "json".into(),
    };
    Orchestrator::new(config, store, sessions, mux, adapters)
}

#[test]
fn socket_clients_bypass_auth() {
    let state = state_with_auth(false, Some("hook-secret"));
    assert!(authorized(&state, &HeaderMap::new()));
}

#[test]
fn tcp_clients_need_matching_bearer_token() {
    let state = state_with_auth(true, Some("hook-secret"));
    let mut headers = HeaderMap::new();
    headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer hook-secret"));
    assert!(authorized(&state, &headers));
}

#[test]
fn tcp_clients_rejected_without_header() {
    let state = state_with_auth(true, Some("hook-secret"));
    assert!(!authorized(&state, &HeaderMap::new()));
}

#[test]
fn tcp_clients_rejected_with_wrong_token() {
    let state = state_with_auth(true, Some("hook-secret"));
    let mut headers = HeaderMap::new();
    headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
    assert!(!authorized(&state, &headers));
}
