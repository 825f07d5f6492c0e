// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval Blocker (§4.G): the one-shot synchronization primitive that
//! suspends a hook until a human decision or timeout arrives. Grounded in
//! the teacher's `replay_gate.rs` "exactly once" texture and its
//! `oneshot`/timer usage elsewhere: each pending request gets a
//! `tokio::sync::oneshot` sender plus a `tokio::time::sleep` task, aborted
//! on resolution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Outcome delivered to the hook waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalOutcome {
    pub blocked: bool,
    pub reason: Option<String>,
}

impl ApprovalOutcome {
    fn approved() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    fn denied(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
        }
    }
}

struct Waiter {
    sender: oneshot::Sender<ApprovalOutcome>,
    session_id: Uuid,
    timer: JoinHandle<()>,
}

/// Map from `request_id` to its live continuation (§3 Ownership: separate
/// from the DB's durable `PendingApproval` row, which only records *that* a
/// request was asked).
#[derive(Default)]
pub struct ApprovalBlocker {
    waiters: parking_lot::Mutex<HashMap<Uuid, Waiter>>,
}

impl ApprovalBlocker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `request_id` and suspend until resolution. Arms a timer
    /// that resolves with a timeout denial if nothing else fires first
    /// (§4.G).
    pub async fn wait_for_approval(self: &Arc<Self>, request_id: Uuid, session_id: Uuid, timeout: Duration) -> ApprovalOutcome {
        let (tx, rx) = oneshot::channel();

        let blocker = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            blocker.resolve(request_id, ApprovalOutcome::denied("Approval timed out"));
        });

        self.waiters.lock().insert(
            request_id,
            Waiter {
                sender: tx,
                session_id,
                timer,
            },
        );

        rx.await.unwrap_or_else(|_| ApprovalOutcome::denied("Gateway shutting down"))
    }

    pub fn approve(&self, request_id: Uuid) -> bool {
        self.resolve(request_id, ApprovalOutcome::approved())
    }

    pub fn deny(&self, request_id: Uuid, reason: Option<String>) -> bool {
        self.resolve(request_id, ApprovalOutcome::denied(reason.unwrap_or_else(|| "Denied by user".to_string())))
    }

    /// Wake every pending waiter belonging to `session_id` (§4.G).
    pub fn cancel_session(&self, session_id: Uuid) {
        let ids: Vec<Uuid> = self
            .waiters
            .lock()
            .iter()
            .filter(|(_, w)| w.session_id == session_id)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.resolve(id, ApprovalOutcome::denied("Session terminated"));
        }
    }

    /// Wake every pending waiter, regardless of session, with the given
    /// reason (§5 graceful shutdown: "deny all pending").
    pub fn deny_all(&self, reason: &str) {
        let ids: Vec<Uuid> = self.waiters.lock().keys().copied().collect();
        for id in ids {
            self.resolve(id, ApprovalOutcome::denied(reason.to_owned()));
        }
    }

    pub fn is_pending(&self, request_id: Uuid) -> bool {
        self.waiters.lock().contains_key(&request_id)
    }

    pub fn size(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Resolve exactly once; subsequent calls for the same `request_id`
    /// are no-ops returning `false`. Cancels the previously-armed timer.
    fn resolve(&self, request_id: Uuid, outcome: ApprovalOutcome) -> bool {
        let waiter = self.waiters.lock().remove(&request_id);
        match waiter {
            Some(waiter) => {
                waiter.timer.abort();
                let _ = waiter.sender.send(outcome);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "approval_tests.rs"]
mod tests;
