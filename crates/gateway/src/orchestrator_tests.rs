use serde_json::json;

use super::*;
use crate::adapter::AdapterRegistry;
use crate::db::Store;
use crate::session::SessionManager;

fn test_orchestrator() -> Arc<Orchestrator> {
    let store = Store::open_in_memory().expect("in-memory store");
    let sessions = SessionManager::new(store.clone());
    let adapters = AdapterRegistry::with_builtin_adapters();
    let mux = MultiplexerDriver::new("/bin/true");
    let config = Config {
        data_dir: None,
        hook_port: 4317,
        hook_secret: Some("hook-secret".to_owned()),
        bind_host: "127.0.0.1".into(),
        lan_port: 4318,
        auto_approve_safe: false,
        approval_timeout_ms: 60_000,
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
fn extract_agent_text_collects_lines_after_marker_until_blank() {
    let pane = "$ claude\n\u{25cf} Here is the answer\nsecond line\n\nTool: Bash\n";
    let text = extract_agent_text(pane, "\u{25cf}").expect("marker found");
    assert_eq!(text, "Here is the answer second line");
}

#[test]
fn extract_agent_text_returns_none_without_marker() {
    let pane = "$ claude\nworking...\n";
    assert!(extract_agent_text(pane, "\u{25cf}").is_none());
}

#[test]
fn extract_agent_text_stops_before_tool_marker_line() {
    let pane = "\u{2726} partial reply\nTool: write_file\n";
    let text = extract_agent_text(pane, "\u{2726}").expect("marker found");
    assert_eq!(text, "partial reply");
}

#[tokio::test]
async fn deny_action_resolves_a_pending_wait_with_the_given_reason() {
    let orchestrator = test_orchestrator();
    let request_id = uuid::Uuid::new_v4();
    let session_id = uuid::Uuid::new_v4();

    let blocker = orchestrator.blocker.clone();
    let waiting = tokio::spawn(async move { blocker.wait_for_approval(request_id, session_id, Duration::from_secs(5)).await });

    orchestrator
        .handle_action(Action::Deny { request_id, reason: Some("no thanks".to_owned()) })
        .await
        .expect("handle deny");

    let outcome = waiting.await.expect("join");
    assert!(outcome.blocked);
    assert_eq!(outcome.reason.as_deref(), Some("no thanks"));
}

#[tokio::test]
async fn batch_approve_resolves_every_listed_request() {
    let orchestrator = test_orchestrator();
    let session_id = uuid::Uuid::new_v4();
    let ids: Vec<uuid::Uuid> = (0..3).map(|_| uuid::Uuid::new_v4()).collect();

    let blocker = orchestrator.blocker.clone();
    let waiters: Vec<_> = ids
        .iter()
        .map(|&id| {
            let blocker = blocker.clone();
            tokio::spawn(async move { blocker.wait_for_approval(id, session_id, Duration::from_secs(5)).await })
        })
        .collect();

    orchestrator.handle_action(Action::BatchApprove { request_ids: ids }).await.expect("handle batch approve");

    for waiter in waiters {
        let outcome = waiter.await.expect("join");
        assert!(!outcome.blocked);
    }
}

#[tokio::test]
async fn approve_with_session_scope_persists_a_trust_rule() {
    let orchestrator = test_orchestrator();
    let session = orchestrator.sessions.create("claude", None, None, &orchestrator.adapters).await.expect("create session");
    let request_id = uuid::Uuid::new_v4();

    orchestrator
        .store
        .create_pending(request_id, session.id, "Bash".to_owned(), "ls".to_owned(), Risk::Safe, json!({}))
        .await
        .expect("create pending");

    orchestrator
        .handle_action(Action::Approve { request_id, scope: Some("session".to_owned()) })
        .await
        .expect("handle approve");

    let trusted = orchestrator
        .store
        .check_trust_rule("Bash".to_owned(), "ls".to_owned(), Risk::Safe, session.id)
        .await
        .expect("check trust rule");
    assert!(trusted);
}

#[tokio::test]
async fn handle_hook_event_rejects_unknown_agent() {
    let orchestrator = test_orchestrator();
    let err = orchestrator.handle_hook_event("not-an-agent", "PreToolUse", json!({})).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownAgent);
}

#[tokio::test]
async fn start_session_action_launches_and_broadcasts() {
    let orchestrator = test_orchestrator();
    let mut rx = orchestrator.subscribe();

    orchestrator
        .handle_action(Action::StartSession { agent: "claude".to_owned(), task: Some("say hi".to_owned()), cwd: None })
        .await
        .expect("start session");

    assert_eq!(orchestrator.active_session_count(), 1);
    let msg = rx.recv().await.expect("broadcast");
    assert_eq!(msg.event_type, "session_start");
}

#[tokio::test]
async fn snapshot_for_new_client_leads_with_session_list() {
    let orchestrator = test_orchestrator();
    orchestrator
        .handle_action(Action::StartSession { agent: "claude".to_owned(), task: None, cwd: None })
        .await
        .expect("start session");

    let snapshot = orchestrator.snapshot_for_new_client().await;
    assert_eq!(snapshot[0].event_type, "session_list");
    assert!(snapshot.iter().any(|m| m.event_type == "session_start"));
}
