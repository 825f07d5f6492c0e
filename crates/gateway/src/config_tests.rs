use super::*;

fn base_config(dir: &std::path::Path) -> Config {
    Config {
        data_dir: Some(dir.to_path_buf()),
        hook_port: 4317,
        hook_secret: None,
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
    }
}

#[test]
fn missing_hook_secret_is_generated_and_persisted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = base_config(dir.path());
    config.merge_file_and_finalize().expect("merge");
    let secret = config.hook_secret.clone().expect("secret generated");
    assert_eq!(secret.len(), 64);

    let file = load_file_config(&config.config_toml_path()).expect("load");
    assert_eq!(file.hook_secret, Some(secret));
}

#[test]
fn existing_secret_in_config_file_is_reused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = base_config(dir.path());
    std::fs::create_dir_all(config.data_dir()).expect("mkdir");
    save_file_config(
        &config.config_toml_path(),
        &FileConfig {
            hook_secret: Some("fixed-secret".into()),
            ..Default::default()
        },
    )
    .expect("save");

    config.merge_file_and_finalize().expect("merge");
    assert_eq!(config.hook_secret.as_deref(), Some("fixed-secret"));
}

#[test]
fn toml_only_values_are_applied_when_cli_left_at_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = base_config(dir.path());
    std::fs::create_dir_all(config.data_dir()).expect("mkdir");
    save_file_config(
        &config.config_toml_path(),
        &FileConfig {
            bind_host: Some("0.0.0.0".into()),
            lan_port: Some(9999),
            approval_timeout_ms: Some(1_234),
            auto_approve_safe: Some(true),
            relay_url: Some("wss://relay.example/ws".into()),
            ..Default::default()
        },
    )
    .expect("save");

    let mut config = base_config(dir.path());
    config.merge_file_and_finalize().expect("merge");

    assert_eq!(config.bind_host, "0.0.0.0");
    assert_eq!(config.lan_port, 9999);
    assert_eq!(config.approval_timeout_ms, 1_234);
    assert!(config.auto_approve_safe);
    assert_eq!(config.relay_url.as_deref(), Some("wss://relay.example/ws"));
}

#[test]
fn cli_value_away_from_default_wins_over_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = base_config(dir.path());
    std::fs::create_dir_all(config.data_dir()).expect("mkdir");
    save_file_config(
        &config.config_toml_path(),
        &FileConfig {
            lan_port: Some(9999),
            ..Default::default()
        },
    )
    .expect("save");

    let mut config = base_config(dir.path());
    config.lan_port = 5555;
    config.merge_file_and_finalize().expect("merge");

    assert_eq!(config.lan_port, 5555);
}

#[test]
fn data_dir_paths_are_namespaced() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = base_config(dir.path());
    assert_eq!(config.db_path(), dir.path().join("agentpager.db"));
    assert_eq!(config.hook_socket_path(), dir.path().join("hook.sock"));
    assert_eq!(config.gateway_socket_path(), dir.path().join("gateway.sock"));
    assert_eq!(config.keys_dir(), dir.path().join("keys"));
}
