use super::*;

#[test]
fn shared_key_agreement_is_symmetric_between_peers() {
    let alice = SigningIdentity::generate();
    let bob = SigningIdentity::generate();

    let alice_view = derive_shared_key(&alice, bob.public_bytes()).expect("derive");
    let bob_view = derive_shared_key(&bob, alice.public_bytes()).expect("derive");

    assert_eq!(alice_view.0, bob_view.0);
}

#[test]
fn seal_then_open_round_trips_utf8_payload() {
    let alice = SigningIdentity::generate();
    let bob = SigningIdentity::generate();
    let key = derive_shared_key(&alice, bob.public_bytes()).expect("derive");

    let mut counter = NonceCounter::default();
    let nonce = counter.next();
    let (nonce_b64, ciphertext_b64) = seal(&key, nonce, b"permission_request payload").expect("seal");

    let decrypted = open(&key, &nonce_b64, &ciphertext_b64).expect("open");
    assert_eq!(decrypted, b"permission_request payload");
}

#[test]
fn open_with_wrong_key_fails() {
    let alice = SigningIdentity::generate();
    let bob = SigningIdentity::generate();
    let mallory = SigningIdentity::generate();

    let key = derive_shared_key(&alice, bob.public_bytes()).expect("derive");
    let wrong_key = derive_shared_key(&mallory, bob.public_bytes()).expect("derive");

    let mut counter = NonceCounter::default();
    let (nonce_b64, ciphertext_b64) = seal(&key, counter.next(), b"secret").expect("seal");

    assert!(open(&wrong_key, &nonce_b64, &ciphertext_b64).is_err());
}

#[test]
fn nonce_counter_increments_and_varies() {
    let mut counter = NonceCounter::default();
    let n1 = counter.next();
    let n2 = counter.next();
    assert_ne!(n1[..4], n2[..4]);
}
