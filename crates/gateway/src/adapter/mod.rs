// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent payload normalizers, launch-command builders, and
//! tmux-prefix mapping (§4.D). Each adapter is a small, stateless
//! implementation of [`Adapter`]; the registry is a name-keyed map, not an
//! inheritance hierarchy (§9).

mod claude;
mod codex;
mod gemini;

use std::collections::HashMap;

use serde_json::Value;

use crate::event::{NormalizedEvent, PermissionPayload, Risk};
use crate::risk;

/// Version-compatibility range an adapter declares for its upstream agent
/// binary.
#[derive(Debug, Clone)]
pub struct VersionRange {
    pub min: Option<&'static str>,
    pub max: Option<&'static str>,
}

/// Per-agent normalizer and launch-command builder (§4.D). All methods are
/// pure except [`Adapter::detect_version`], which shells out.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    fn launch_binary(&self) -> &'static str;
    fn session_prefix(&self) -> &'static str;
    fn version_range(&self) -> VersionRange;
    fn hook_endpoints(&self) -> &'static [&'static str];

    /// Probe the installed binary's version. `None` when it cannot be
    /// determined (binary missing, unparsable output).
    fn detect_version(&self) -> Option<String> {
        let output = std::process::Command::new(self.launch_binary())
            .arg("--version")
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        text.split_whitespace()
            .find(|tok| tok.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .map(str::to_string)
    }

    /// Map a vendor-specific hook payload at `endpoint` to the unified
    /// event shape, or `None` if the endpoint/shape is unrecognized.
    fn normalize_hook_payload(&self, raw: &Value, endpoint: &str) -> Option<NormalizedEvent>;

    /// Extract a permission payload's risk-relevant fields from a raw
    /// `PreToolUse`-shaped payload.
    fn extract_permission(&self, raw: &Value) -> Option<PermissionPayload>;

    fn classify_risk(&self, tool: &str, input: &Value) -> Risk {
        risk::classify(tool, input)
    }

    /// Build the argv used to launch this agent inside a fresh multiplexer
    /// session.
    fn build_launch_command(&self, task: &str, flags: &[String]) -> Vec<String>;

    /// Whether `tool_name` is this agent's "ask the user a question" tool
    /// (§4.K.1.a).
    fn is_question_tool(&self, tool_name: &str) -> bool {
        tool_name.eq_ignore_ascii_case("askuserquestion")
    }

    /// Sigil this agent prefixes its own text responses with in the
    /// multiplexer pane, used by agent-text extraction (§4.K.2).
    fn response_marker(&self) -> &'static str {
        "\u{25cf}"
    }
}

/// Name-keyed registry of built-in adapters (§4.D, §9).
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Box<dyn Adapter>>,
    default_name: &'static str,
}

impl AdapterRegistry {
    /// Build the registry with the built-in `claude`/`gemini`/`codex`
    /// adapters and probe each one's version at startup, logging a
    /// mismatch without blocking boot (§4.D).
    pub fn with_builtin_adapters() -> Self {
        let mut adapters: HashMap<&'static str, Box<dyn Adapter>> = HashMap::new();
        adapters.insert("claude", Box::new(claude::ClaudeAdapter));
        adapters.insert("gemini", Box::new(gemini::GeminiAdapter));
        adapters.insert("codex", Box::new(codex::CodexAdapter));

        let registry = Self {
            adapters,
            default_name: "claude",
        };
        registry.detect_all_versions();
        registry
    }

    fn detect_all_versions(&self) {
        for (name, adapter) in &self.adapters {
            let range = adapter.version_range();
            match adapter.detect_version() {
                Some(version) => {
                    if !version_in_range(&version, &range) {
                        tracing::warn!(agent = %name, %version, "adapter version outside compatibility range");
                    }
                }
                None => tracing::debug!(agent = %name, "adapter version could not be detected"),
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Adapter> {
        self.adapters.get(name).map(|b| b.as_ref())
    }

    /// Falls back to any registered adapter if `default_name` was somehow
    /// never inserted, rather than panicking (§9 "no panics in non-test
    /// code").
    pub fn default_adapter(&self) -> Option<&dyn Adapter> {
        self.adapters
            .get(self.default_name)
            .or_else(|| self.adapters.values().next())
            .map(|b| b.as_ref())
    }

    pub fn default_name(&self) -> &'static str {
        self.default_name
    }

    /// Recovery lookup: resolve an adapter by the prefix of a multiplexer
    /// session name (§4.D, §4.F recovery).
    pub fn find_by_prefix(&self, multiplexer_session_name: &str) -> Option<&dyn Adapter> {
        self.adapters
            .values()
            .find(|a| multiplexer_session_name.starts_with(a.session_prefix()))
            .map(|b| b.as_ref())
    }

    /// Payload-routing lookup: resolve an adapter by its launch-binary name.
    pub fn find_by_binary(&self, name: &str) -> Option<&dyn Adapter> {
        self.adapters.values().find(|a| a.launch_binary() == name).map(|b| b.as_ref())
    }
}

fn version_in_range(version: &str, range: &VersionRange) -> bool {
    let parse = |s: &str| -> Option<(u64, u64, u64)> {
        let mut parts = s.split('.').filter_map(|p| p.parse::<u64>().ok());
        Some((parts.next()?, parts.next().unwrap_or(0), parts.next().unwrap_or(0)))
    };
    let Some(v) = parse(version) else { return true };
    if let Some(min) = range.min.and_then(parse) {
        if v < min {
            return false;
        }
    }
    if let Some(max) = range.max.and_then(parse) {
        if v > max {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
