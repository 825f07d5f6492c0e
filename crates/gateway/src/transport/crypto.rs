// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional end-to-end encryption for the relay transport (§4.J): Edwards
//! to Montgomery key conversion, X25519 ECDH, HKDF-SHA256 key derivation,
//! and AES-256-GCM sealing. The relay itself only ever sees the ciphertext
//! blob and an optional unencrypted hint.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use curve25519_dalek::edwards::CompressedEdwardsY;
use hkdf::Hkdf;
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

const HKDF_INFO: &[u8] = b"agentpager-relay-e2e-v1";

/// The gateway's Ed25519 signing keypair, loaded from `keys/gateway.key`
/// (§6 Persisted state layout).
pub struct SigningIdentity {
    signing_key: ed25519_dalek::SigningKey,
}

impl SigningIdentity {
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rngs::ThreadRng::default().fill_bytes(&mut seed);
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        }
    }

    pub fn seed_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Edwards private scalar -> X25519 static secret, via SHA-512 of the
    /// seed (the same expansion Ed25519 signing uses internally);
    /// `x25519_dalek::StaticSecret::from` performs the scalar clamping.
    fn to_x25519_secret(&self) -> x25519_dalek::StaticSecret {
        let hash = Sha512::digest(self.signing_key.to_bytes());
        let mut scalar_bytes = [0u8; 32];
        scalar_bytes.copy_from_slice(&hash[..32]);
        x25519_dalek::StaticSecret::from(scalar_bytes)
    }
}

/// Edwards public key -> X25519 Montgomery public key.
fn edwards_public_to_x25519(public_bytes: [u8; 32]) -> anyhow::Result<x25519_dalek::PublicKey> {
    let compressed = CompressedEdwardsY(public_bytes);
    let point = compressed.decompress().ok_or_else(|| anyhow::anyhow!("invalid Edwards public key"))?;
    Ok(x25519_dalek::PublicKey::from(point.to_montgomery().to_bytes()))
}

/// Derived 32-byte symmetric key, cached after the one-time handshake
/// (§4.J).
#[derive(Clone)]
pub struct SharedKey(pub [u8; 32]);

/// Perform the key-agreement handshake described in §4.J: ECDH on the
/// derived X25519 pair, then HKDF-SHA256 with a fixed info tag.
pub fn derive_shared_key(local: &SigningIdentity, peer_public_bytes: [u8; 32]) -> anyhow::Result<SharedKey> {
    let local_secret = local.to_x25519_secret();
    let peer_public = edwards_public_to_x25519(peer_public_bytes)?;
    let shared = local_secret.diffie_hellman(&peer_public);

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm).map_err(|_| anyhow::anyhow!("HKDF expand failed"))?;
    Ok(SharedKey(okm))
}

/// Outer, unencrypted label carrying only enough metadata to route a push
/// notification (§4.J, GLOSSARY "E2E hint").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct E2eHint {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "toolName", skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
}

/// Wire shape of an E2E-wrapped relay message (§4.J, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct E2eEnvelope {
    pub e2e: bool,
    pub nonce: String,
    pub ciphertext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<E2eHint>,
}

/// Monotonic nonce counter: 4-byte counter || 8-byte random, per message
/// (§4.J).
pub struct NonceCounter {
    counter: u32,
}

impl Default for NonceCounter {
    fn default() -> Self {
        Self { counter: 0 }
    }
}

impl NonceCounter {
    pub fn next(&mut self) -> [u8; 12] {
        self.counter = self.counter.wrapping_add(1);
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&self.counter.to_be_bytes());
        rand::rngs::ThreadRng::default().fill_bytes(&mut nonce[4..]);
        nonce
    }
}

/// Encrypt `plaintext` with AES-256-GCM, returning the base64url-encoded
/// nonce and ciphertext+tag.
pub fn seal(key: &SharedKey, nonce_bytes: [u8; 12], plaintext: &[u8]) -> anyhow::Result<(String, String)> {
    let unbound = UnboundKey::new(&AES_256_GCM, &key.0).map_err(|_| anyhow::anyhow!("invalid AEAD key"))?;
    let sealing_key = LessSafeKey::new(unbound);
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| anyhow::anyhow!("AEAD seal failed"))?;

    Ok((URL_SAFE_NO_PAD.encode(nonce_bytes), URL_SAFE_NO_PAD.encode(in_out)))
}

/// Decrypt a base64url nonce/ciphertext pair produced by [`seal`].
pub fn open(key: &SharedKey, nonce_b64: &str, ciphertext_b64: &str) -> anyhow::Result<Vec<u8>> {
    let nonce_bytes = URL_SAFE_NO_PAD.decode(nonce_b64)?;
    let nonce_arr: [u8; 12] = nonce_bytes.try_into().map_err(|_| anyhow::anyhow!("bad nonce length"))?;
    let mut in_out = URL_SAFE_NO_PAD.decode(ciphertext_b64)?;

    let unbound = UnboundKey::new(&AES_256_GCM, &key.0).map_err(|_| anyhow::anyhow!("invalid AEAD key"))?;
    let opening_key = LessSafeKey::new(unbound);
    let nonce = Nonce::assume_unique_for_key(nonce_arr);

    let plaintext = opening_key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| anyhow::anyhow!("AEAD open failed"))?;
    Ok(plaintext.to_vec())
}

/// Fingerprint used for logging (never the key itself).
pub fn key_fingerprint(public_bytes: [u8; 32]) -> String {
    let hash = Sha256::digest(public_bytes);
    hash.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "crypto_tests.rs"]
mod tests;
