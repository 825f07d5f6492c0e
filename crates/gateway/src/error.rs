// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified error taxonomy shared across the hook, LAN, and relay transports.

use serde::{Deserialize, Serialize};

/// A gateway-wide error code, mapped per-transport at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnknownAgent,
    MalformedPayload,
    PayloadTooLarge,
    Unauthorized,
    NotFound,
    ProtocolError,
    Internal,
}

impl ErrorCode {
    /// HTTP status for hook/REST responses.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UnknownAgent => 400,
            Self::MalformedPayload => 400,
            Self::PayloadTooLarge => 413,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::ProtocolError => 400,
            Self::Internal => 500,
        }
    }

    /// Wire string used as the `code` field of a WS `error` event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownAgent => "UNKNOWN_AGENT",
            Self::MalformedPayload => "MALFORMED_PAYLOAD",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error body shape returned to hook callers and wrapped into WS `error`
/// events.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ErrorCode {
    pub fn body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody {
            code: self.as_str(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
