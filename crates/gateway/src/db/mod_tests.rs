use super::*;
use serde_json::json;

fn new_session(id: Uuid) -> Session {
    let now = crate::event::now_iso8601();
    Session {
        id,
        agent: "claude".into(),
        agent_version: None,
        task: Some("fix bug".into()),
        cwd: Some("/tmp".into()),
        multiplexer_session_name: None,
        status: SessionStatus::Created,
        auto_approve: false,
        created_at: now.clone(),
        updated_at: now,
        finished_at: None,
        metadata: json!({}),
        seq_counter: 0,
        last_broadcast_text: None,
    }
}

#[tokio::test]
async fn create_and_get_session_round_trips() {
    let store = Store::open_in_memory().expect("open");
    let id = Uuid::new_v4();
    store.create_session(new_session(id)).await.expect("create");
    let fetched = store.get_session(id).await.expect("get").expect("present");
    assert_eq!(fetched.agent, "claude");
    assert_eq!(fetched.status, SessionStatus::Created);
}

#[tokio::test]
async fn list_sessions_active_only_filters_terminal_statuses() {
    let store = Store::open_in_memory().expect("open");
    let running = Uuid::new_v4();
    let done = Uuid::new_v4();
    store.create_session(new_session(running)).await.expect("create");
    store.create_session(new_session(done)).await.expect("create");
    store.update_status(running, SessionStatus::Running).await.expect("update");
    store.update_status(done, SessionStatus::Done).await.expect("update");

    let active = store.list_sessions(true).await.expect("list");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, running);

    let all = store.list_sessions(false).await.expect("list");
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn update_status_sets_finished_at_only_once() {
    let store = Store::open_in_memory().expect("open");
    let id = Uuid::new_v4();
    store.create_session(new_session(id)).await.expect("create");
    store.update_status(id, SessionStatus::Done).await.expect("update");
    let first = store.get_session(id).await.expect("get").expect("present").finished_at;
    assert!(first.is_some());

    store.update_status(id, SessionStatus::Error).await.expect("update");
    let second = store.get_session(id).await.expect("get").expect("present").finished_at;
    assert_eq!(first, second);
}

#[tokio::test]
async fn update_multiplexer_name_persists_the_new_name() {
    let store = Store::open_in_memory().expect("open");
    let id = Uuid::new_v4();
    store.create_session(new_session(id)).await.expect("create");

    store.update_multiplexer_name(id, "ap-cc-real".into()).await.expect("update");

    let fetched = store.get_session(id).await.expect("get").expect("present");
    assert_eq!(fetched.multiplexer_session_name.as_deref(), Some("ap-cc-real"));
}

#[tokio::test]
async fn close_checkpoints_without_error() {
    let store = Store::open_in_memory().expect("open");
    store.close().await.expect("close");
}

#[tokio::test]
async fn insert_event_and_events_since_round_trip_in_order() {
    let store = Store::open_in_memory().expect("open");
    let id = Uuid::new_v4();
    store.create_session(new_session(id)).await.expect("create");
    store.insert_event(id, 1, "session_start".into(), json!({"a": 1})).await.expect("insert");
    store.insert_event(id, 2, "tool_complete".into(), json!({"a": 2})).await.expect("insert");

    let events = store.events_since(id, 0, 10).await.expect("events");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].seq, 1);
    assert_eq!(events[1].seq, 2);
    assert_eq!(events[1].payload, json!({"a": 2}));

    assert_eq!(store.latest_seq(id).await.expect("latest"), 2);
}

#[tokio::test]
async fn duplicate_seq_for_same_session_is_rejected() {
    let store = Store::open_in_memory().expect("open");
    let id = Uuid::new_v4();
    store.create_session(new_session(id)).await.expect("create");
    store.insert_event(id, 1, "a".into(), json!({})).await.expect("first insert");
    let second = store.insert_event(id, 1, "b".into(), json!({})).await;
    assert!(second.is_err());
}

#[tokio::test]
async fn pending_approval_lifecycle() {
    let store = Store::open_in_memory().expect("open");
    let session_id = Uuid::new_v4();
    let request_id = Uuid::new_v4();
    store.create_session(new_session(session_id)).await.expect("create");
    store
        .create_pending(request_id, session_id, "Bash".into(), "ls".into(), Risk::Safe, json!({}))
        .await
        .expect("create pending");

    assert!(store.get_pending(request_id).await.expect("get").is_some());
    assert_eq!(store.count_pending_unresolved(session_id).await.expect("count"), 1);

    let resolved = store.resolve_pending(request_id, Resolution::Approved).await.expect("resolve");
    assert!(resolved);
    assert!(store.get_pending(request_id).await.expect("get").is_none());

    let resolved_again = store.resolve_pending(request_id, Resolution::Denied).await.expect("resolve again");
    assert!(!resolved_again);
}

#[tokio::test]
async fn trust_rule_session_scope_beats_global_and_respects_risk_ordering() {
    let store = Store::open_in_memory().expect("open");
    let session_id = Uuid::new_v4();
    store.create_session(new_session(session_id)).await.expect("create");

    store
        .add_trust_rule(NewTrustRule {
            tool: "Bash".into(),
            target_pattern: None,
            risk_max: Risk::Safe,
            scope: TrustScope::Session,
            session_id: Some(session_id),
        })
        .await
        .expect("add rule");

    assert!(store
        .check_trust_rule("Bash".into(), "ls".into(), Risk::Safe, session_id)
        .await
        .expect("check"));
    assert!(!store
        .check_trust_rule("Bash".into(), "curl example.com".into(), Risk::Moderate, session_id)
        .await
        .expect("check"));
}

#[tokio::test]
async fn clear_session_trust_rules_removes_only_that_session() {
    let store = Store::open_in_memory().expect("open");
    let session_id = Uuid::new_v4();
    store.create_session(new_session(session_id)).await.expect("create");
    store
        .add_trust_rule(NewTrustRule {
            tool: "Bash".into(),
            target_pattern: None,
            risk_max: Risk::Safe,
            scope: TrustScope::Session,
            session_id: Some(session_id),
        })
        .await
        .expect("add rule");
    store.clear_session_trust_rules(session_id).await.expect("clear");
    assert!(!store
        .check_trust_rule("Bash".into(), "ls".into(), Risk::Safe, session_id)
        .await
        .expect("check"));
}

#[tokio::test]
async fn search_events_matches_fts_index() {
    let store = Store::open_in_memory().expect("open");
    let id = Uuid::new_v4();
    store.create_session(new_session(id)).await.expect("create");
    store
        .insert_event(id, 1, "message".into(), json!({"text": "the quick brown fox"}))
        .await
        .expect("insert");
    store.insert_event(id, 2, "message".into(), json!({"text": "unrelated content"})).await.expect("insert");

    let results = store.search_events("quick".into(), None).await.expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].seq, 1);
}
