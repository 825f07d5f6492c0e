// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use agentpager_gateway::adapter::AdapterRegistry;
use agentpager_gateway::config::Config;
use agentpager_gateway::db::Store;
use agentpager_gateway::mux::MultiplexerDriver;
use agentpager_gateway::orchestrator::Orchestrator;
use agentpager_gateway::session::SessionManager;
use agentpager_gateway::transport::relay::{self, RelayConfig, RelayE2e};
use agentpager_gateway::transport::{crypto, lan};
use agentpager_gateway::hooks;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    };
    init_tracing(&config);

    if let Err(err) = run(config).await {
        error!("fatal: {err:#}");
        std::process::exit(1);
    }
}

/// Initialize tracing from config. Uses `try_init` so it's safe to call more
/// than once (e.g. from integration tests that build their own gateway).
fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store = Store::open(&config.db_path())?;
    let sessions = SessionManager::new(store.clone());
    let adapters = AdapterRegistry::with_builtin_adapters();
    let mux = MultiplexerDriver::default();

    let orchestrator = Orchestrator::new(config.clone(), store, sessions, mux, adapters);
    let report = orchestrator.recover().await?;
    info!(restored = report.restored, cleaned = report.cleaned, "startup recovery complete");

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let hook_orchestrator = orchestrator.clone();
    let hook_host = config.bind_host.clone();
    let hook_port = config.hook_port;
    let hook_socket = config.hook_socket_path();
    let hooks_task = tokio::spawn(async move {
        if let Err(err) = hooks::serve(hook_orchestrator, &hook_host, hook_port, &hook_socket).await {
            error!(error = %err, "hook ingestion exited");
        }
    });

    let lan_orchestrator = orchestrator.clone();
    let lan_host = config.bind_host.clone();
    let lan_port = config.lan_port;
    let lan_socket = config.gateway_socket_path();
    let lan_shutdown = shutdown.clone();
    let lan_task = tokio::spawn(async move {
        if let Err(err) = lan::serve(lan_orchestrator, &lan_host, lan_port, &lan_socket, lan_shutdown).await {
            error!(error = %err, "LAN transport exited");
        }
    });

    let relay_task = match build_relay_config(&config) {
        Some(relay_config) => {
            let relay_orchestrator = orchestrator.clone();
            Some(tokio::spawn(async move {
                relay::serve(relay_orchestrator, relay_config).await;
            }))
        }
        None => None,
    };

    shutdown.cancelled().await;
    info!("shutting down");

    // Stop accepting new hooks first, then deny everything still blocked
    // before the transports are torn down (§5).
    hooks_task.abort();
    if let Err(err) = orchestrator.shutdown().await {
        error!(error = %err, "error during graceful shutdown");
    }

    // Give open LAN WebSocket connections a beat to send their 1001-class
    // close frame (driven by the same `shutdown` token) before the listener
    // task is aborted out from under them.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    lan_task.abort();
    if let Some(task) = relay_task {
        task.abort();
    }
    Ok(())
}

/// Resolve the optional relay transport's configuration, generating a fresh
/// signing identity under `keys_dir` when E2E is requested but no identity
/// exists yet (§4.J).
fn build_relay_config(config: &Config) -> Option<RelayConfig> {
    let url = config.relay_url.clone()?;
    let token = config.relay_token.clone().unwrap_or_default();

    let e2e = if config.relay_e2e {
        match load_relay_e2e(config) {
            Ok(e2e) => Some(e2e),
            Err(err) => {
                error!(error = %err, "failed to set up relay E2E, continuing without it");
                None
            }
        }
    } else {
        None
    };

    Some(RelayConfig { url, token, e2e })
}

fn load_relay_e2e(config: &Config) -> anyhow::Result<RelayE2e> {
    let identity = Arc::new(load_or_generate_identity(&config.keys_dir())?);
    let peer_key_hex = config
        .relay_peer_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("AGENTPAGER_RELAY_PEER_KEY required when relay E2E is enabled"))?;
    let peer_bytes = decode_hex_32(peer_key_hex)?;
    let shared_key = crypto::derive_shared_key(&identity, peer_bytes)?;
    Ok(RelayE2e { identity, shared_key })
}

/// Load the gateway's signing identity from `keys/gateway.key`, generating
/// and persisting a fresh one on first run (§6 Persisted state layout).
fn load_or_generate_identity(keys_dir: &std::path::Path) -> anyhow::Result<crypto::SigningIdentity> {
    std::fs::create_dir_all(keys_dir)?;
    let path = keys_dir.join("gateway.key");

    if let Ok(text) = std::fs::read_to_string(&path) {
        let seed = decode_hex_32(text.trim())?;
        return Ok(crypto::SigningIdentity::from_seed(seed));
    }

    let identity = crypto::SigningIdentity::generate();
    std::fs::write(&path, hex_encode(&identity.seed_bytes()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(identity)
}

fn decode_hex_32(s: &str) -> anyhow::Result<[u8; 32]> {
    if s.len() != 64 {
        anyhow::bail!("expected 64 hex characters, got {}", s.len());
    }
    let mut bytes = [0u8; 32];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)?;
    }
    Ok(bytes)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// First signal triggers graceful shutdown; a second forces immediate exit
/// (§5 "never block shutdown on an in-flight request").
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async { if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGTERM");
            }
            _ = async { if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();

        tokio::select! {
            _ = async { if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await } } => {
                info!("received signal again, forcing exit");
                std::process::exit(130);
            }
            _ = async { if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await } } => {
                info!("received signal again, forcing exit");
                std::process::exit(130);
            }
        }
    });
}
