// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relay Transport (§4.J): one outbound WebSocket to a remote relay room,
//! reconnected with exponential backoff, optionally E2E-encrypting outbound
//! broadcasts and decrypting inbound messages with the primitives in
//! [`crate::transport::crypto`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::event::{BroadcastMessage, Envelope};
use crate::orchestrator::Orchestrator;
use crate::transport::crypto::{self, E2eEnvelope, E2eHint, NonceCounter, SharedKey, SigningIdentity};
use crate::transport::{Action, TransportSeq};

const RECONNECT_INITIAL: Duration = Duration::from_secs(2);
const RECONNECT_MAX: Duration = Duration::from_secs(60);

/// E2E material for the relay connection, present only when both keys are
/// configured (§4.J "Optional end-to-end encryption").
#[derive(Clone)]
pub struct RelayE2e {
    pub identity: Arc<SigningIdentity>,
    pub shared_key: SharedKey,
}

pub struct RelayConfig {
    pub url: String,
    pub token: String,
    pub e2e: Option<RelayE2e>,
}

/// Runs the relay client loop until the orchestrator is shut down. Never
/// returns an error: connection failures are logged and retried with
/// backoff, matching the degrade-gracefully policy in §4.J/§5.
pub async fn serve(orchestrator: Arc<Orchestrator>, config: RelayConfig) {
    let mut backoff = RECONNECT_INITIAL;
    let seq = TransportSeq::default();
    let mut nonce_counter = NonceCounter::default();

    loop {
        match connect_and_stream(&orchestrator, &config, &seq, &mut nonce_counter).await {
            Ok(()) => {
                info!("relay connection closed cleanly");
                backoff = RECONNECT_INITIAL;
            }
            Err(err) => {
                warn!(error = %err, "relay connection failed, retrying");
            }
        }

        let jitter_ms: u64 = rand::rng().random_range(0..250);
        tokio::time::sleep(backoff + Duration::from_millis(jitter_ms)).await;
        backoff = (backoff * 2).min(RECONNECT_MAX);
    }
}

async fn connect_and_stream(
    orchestrator: &Arc<Orchestrator>,
    config: &RelayConfig,
    seq: &TransportSeq,
    nonce_counter: &mut NonceCounter,
) -> anyhow::Result<()> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    let mut request = config.url.as_str().into_client_request()?;
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {}", config.token).parse()?);

    let (ws, _) = tokio_tungstenite::connect_async(request).await?;
    info!(url = %config.url, "relay connected");
    let (mut write, mut read) = ws.split();

    let mut broadcast_rx = orchestrator.subscribe();
    for msg in orchestrator.snapshot_for_new_client().await {
        send_envelope(&mut write, config, seq, nonce_counter, msg).await?;
    }

    loop {
        tokio::select! {
            event = broadcast_rx.recv() => {
                let event = match event {
                    Ok(e) => e,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
                };
                send_envelope(&mut write, config, seq, nonce_counter, event).await?;
            }
            incoming = read.next() => {
                let incoming = match incoming {
                    Some(Ok(m)) => m,
                    Some(Err(err)) => return Err(err.into()),
                    None => return Ok(()),
                };
                if let Message::Text(text) = incoming {
                    if let Err(err) = dispatch_incoming(orchestrator, config, &text).await {
                        debug!(error = %err, "dropping malformed relay message");
                    }
                }
            }
        }
    }
}

async fn send_envelope(
    write: &mut (impl SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
    config: &RelayConfig,
    seq: &TransportSeq,
    nonce_counter: &mut NonceCounter,
    msg: BroadcastMessage,
) -> anyhow::Result<()> {
    let envelope = Envelope::new(seq.next(), msg.event_type.clone(), msg.session_id, msg.payload);
    let text = match &config.e2e {
        None => serde_json::to_string(&envelope)?,
        Some(e2e) => {
            let plaintext = serde_json::to_vec(&envelope)?;
            let nonce = nonce_counter.next();
            let (nonce_b64, ciphertext_b64) = crypto::seal(&e2e.shared_key, nonce, &plaintext)?;
            let hint = e2e_hint_for(&msg.event_type, &envelope.payload);
            let wrapped = E2eEnvelope {
                e2e: true,
                nonce: nonce_b64,
                ciphertext: ciphertext_b64,
                hint: Some(hint),
            };
            serde_json::to_string(&wrapped)?
        }
    };
    write.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Builds the outer, unencrypted hint (never the command/diff/target).
fn e2e_hint_for(event_type: &str, payload: &serde_json::Value) -> E2eHint {
    E2eHint {
        event_type: event_type.to_owned(),
        tool_name: payload.get("toolName").and_then(|v| v.as_str()).map(str::to_owned),
        risk: payload.get("riskLevel").and_then(|v| v.as_str()).map(str::to_owned),
    }
}

async fn dispatch_incoming(orchestrator: &Arc<Orchestrator>, config: &RelayConfig, text: &str) -> anyhow::Result<()> {
    let raw: serde_json::Value = serde_json::from_str(text)?;
    let is_e2e = raw.get("e2e").and_then(|v| v.as_bool()).unwrap_or(false);

    let action_json = if is_e2e {
        let wrapped: E2eEnvelope = serde_json::from_value(raw)?;
        let e2e = config
            .e2e
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("received E2E message without configured key"))?;
        let plaintext = crypto::open(&e2e.shared_key, &wrapped.nonce, &wrapped.ciphertext)?;
        serde_json::from_slice(&plaintext)?
    } else {
        raw
    };

    let action: Action = serde_json::from_value(action_json)?;
    orchestrator.handle_action(action).await
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
