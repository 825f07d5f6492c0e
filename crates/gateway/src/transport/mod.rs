// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared action-schema table and envelope-sequencing helpers for the LAN
//! and relay transports (§4.I, §4.J, §6).

pub mod auth;
pub mod crypto;
pub mod lan;
pub mod relay;

use serde::Deserialize;
use uuid::Uuid;

/// Inbound action envelope, tagged by `type` exactly as the teacher's own
/// `ClientMessage` enum is (§9 "tagged-variant... style").
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Approve {
        #[serde(rename = "requestId")]
        request_id: Uuid,
        scope: Option<String>,
    },
    Deny {
        #[serde(rename = "requestId")]
        request_id: Uuid,
        reason: Option<String>,
    },
    EditApprove {
        #[serde(rename = "requestId")]
        request_id: Uuid,
        #[serde(rename = "newInput")]
        new_input: serde_json::Value,
    },
    TextInput {
        #[serde(rename = "sessionId")]
        session_id: Option<Uuid>,
        text: String,
    },
    Stop {
        #[serde(rename = "sessionId")]
        session_id: Option<Uuid>,
        force: Option<bool>,
    },
    Pause {},
    StartSession {
        agent: String,
        task: Option<String>,
        cwd: Option<String>,
    },
    TerminalInput {
        #[serde(rename = "sessionId")]
        session_id: Option<Uuid>,
        text: String,
    },
    BatchApprove {
        #[serde(rename = "requestIds")]
        request_ids: Vec<Uuid>,
    },
    ResumeFromSeq {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        #[serde(rename = "sinceSeq")]
        since_seq: u64,
    },
    Auth {
        token: String,
    },
}

/// Monotonic per-transport sequence counter for outbound envelopes (§4.I:
/// "seq is a per-transport monotonic counter").
#[derive(Default)]
pub struct TransportSeq(std::sync::atomic::AtomicU64);

impl TransportSeq {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
