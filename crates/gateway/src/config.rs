// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway configuration: CLI flags, environment overrides, and the
//! `config.toml` file under the data directory, merged in that precedence
//! order (file < env < CLI).

use std::path::{Path, PathBuf};

use clap::Parser;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Default directory for all gateway state when `--data-dir` is unset.
fn default_data_dir() -> PathBuf {
    dirs_home().join(".agentpager")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, Parser)]
#[command(name = "agentpager", version)]
pub struct Config {
    /// Directory holding the database, sockets, and keys.
    #[arg(long, env = "AGENTPAGER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Hook ingestion HTTP port (loopback only unless explicitly rebound).
    #[arg(long, env = "BRIDGE_PORT", default_value_t = 4317)]
    pub hook_port: u16,

    /// Hook auth token; auto-generated and persisted on first run if unset.
    #[arg(long, env = "BRIDGE_SECRET")]
    pub hook_secret: Option<String>,

    /// LAN WebSocket/REST bind host.
    #[arg(long, env = "AGENTPAGER_BIND_HOST", default_value = "127.0.0.1")]
    pub bind_host: String,

    /// LAN WebSocket/REST bind port.
    #[arg(long, env = "AGENTPAGER_LAN_PORT", default_value_t = 4318)]
    pub lan_port: u16,

    /// Auto-approve requests the risk classifier marks `safe`.
    #[arg(long, env = "AGENTPAGER_AUTO_APPROVE_SAFE")]
    pub auto_approve_safe: bool,

    /// Approval timeout in milliseconds.
    #[arg(long, env = "AGENTPAGER_APPROVAL_TIMEOUT_MS", default_value_t = 300_000)]
    pub approval_timeout_ms: u64,

    /// Optional outbound relay URL (`wss://.../ws/gateway?room=<id>`).
    #[arg(long, env = "AGENTPAGER_RELAY_URL")]
    pub relay_url: Option<String>,

    /// Bearer token presented to the relay.
    #[arg(long, env = "AGENTPAGER_RELAY_TOKEN")]
    pub relay_token: Option<String>,

    /// Enable end-to-end encryption on the relay transport.
    #[arg(long, env = "AGENTPAGER_RELAY_E2E")]
    pub relay_e2e: bool,

    /// Hex-encoded peer signing public key for relay E2E (32 bytes).
    #[arg(long, env = "AGENTPAGER_RELAY_PEER_KEY")]
    pub relay_peer_key: Option<String>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "AGENTPAGER_LOG_FORMAT", default_value = "json")]
    pub log_format: String,
}

/// Subset of [`Config`] persisted to / loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub hook_port: Option<u16>,
    pub hook_secret: Option<String>,
    pub bind_host: Option<String>,
    pub lan_port: Option<u16>,
    pub auto_approve_safe: Option<bool>,
    pub approval_timeout_ms: Option<u64>,
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
}

impl Config {
    /// Parse CLI/env, then merge file defaults in underneath and, if the
    /// hook secret is still unset, generate and persist one.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Config::parse();
        config.merge_file_and_finalize()?;
        Ok(config)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("agentpager.db")
    }

    pub fn hook_socket_path(&self) -> PathBuf {
        self.data_dir().join("hook.sock")
    }

    pub fn gateway_socket_path(&self) -> PathBuf {
        self.data_dir().join("gateway.sock")
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.data_dir().join("keys")
    }

    fn merge_file_and_finalize(&mut self) -> anyhow::Result<()> {
        std::fs::create_dir_all(self.data_dir())?;
        let file = load_file_config(&self.config_toml_path())?;
        let defaults = Config::parse_from(["agentpager"]);

        if self.hook_secret.is_none() {
            self.hook_secret = file.hook_secret.clone();
        }
        if self.hook_secret.is_none() {
            self.hook_secret = Some(generate_token());
        }

        // For every other field, a value left at its CLI/env default falls
        // back to whatever config.toml carries (file < env < CLI).
        if self.bind_host == defaults.bind_host {
            if let Some(v) = &file.bind_host {
                self.bind_host = v.clone();
            }
        }
        if self.lan_port == defaults.lan_port {
            if let Some(v) = file.lan_port {
                self.lan_port = v;
            }
        }
        if self.approval_timeout_ms == defaults.approval_timeout_ms {
            if let Some(v) = file.approval_timeout_ms {
                self.approval_timeout_ms = v;
            }
        }
        if self.auto_approve_safe == defaults.auto_approve_safe {
            if let Some(v) = file.auto_approve_safe {
                self.auto_approve_safe = v;
            }
        }
        if self.relay_url.is_none() {
            self.relay_url = file.relay_url.clone();
        }
        if self.relay_token.is_none() {
            self.relay_token = file.relay_token.clone();
        }

        let mut persisted = file;
        persisted.hook_secret = self.hook_secret.clone();
        persisted.hook_port.get_or_insert(self.hook_port);
        persisted.bind_host = Some(self.bind_host.clone());
        persisted.lan_port = Some(self.lan_port);
        persisted.approval_timeout_ms = Some(self.approval_timeout_ms);
        persisted.auto_approve_safe = Some(self.auto_approve_safe);
        if self.relay_url.is_some() {
            persisted.relay_url = self.relay_url.clone();
        }
        if self.relay_token.is_some() {
            persisted.relay_token = self.relay_token.clone();
        }
        save_file_config(&self.config_toml_path(), &persisted)?;
        Ok(())
    }
}

fn load_file_config(path: &Path) -> anyhow::Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text).unwrap_or_default())
}

fn save_file_config(path: &Path, config: &FileConfig) -> anyhow::Result<()> {
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Generate a random 32-byte hook token, hex-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::ThreadRng::default().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
