use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Signer, Verifier};
use hkdf::Hkdf;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::Sha256;
use x25519_dalek::{PublicKey as AgreementPublic, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::{PrivateKey, PublicKey};

/// Length of the per-message symmetric key, in printable characters.
pub const SYMMETRIC_KEY_LEN: usize = 16;

const NONCE_LEN: usize = 12;
const EPHEMERAL_LEN: usize = 32;
const TAG_LEN: usize = 16;
const WRAP_INFO: &[u8] = b"tierflow-envelope-key-wrap-v1";

/// One secured hop as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Base64 Ed25519 signature over the plaintext.
    pub signature: String,
    /// Base64 `ephemeral_pub || nonce || AES-256-GCM(symmetric key)`.
    pub wrapped_key: String,
    /// Base64 `nonce || AES-128-GCM(plaintext)`.
    pub cipher_text: String,
}

/// Why an envelope was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Malformed,
    KeyUnwrap,
    Decrypt,
    SignatureMismatch,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RejectReason::Malformed => "malformed envelope",
            RejectReason::KeyUnwrap => "symmetric key could not be unwrapped",
            RejectReason::Decrypt => "payload could not be decrypted",
            RejectReason::SignatureMismatch => "signature mismatch",
        };
        f.write_str(text)
    }
}

/// Outcome of [`open`]. Rejection is an expected result, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    Verified(String),
    Rejected(RejectReason),
}

impl Opened {
    pub fn is_verified(&self) -> bool {
        matches!(self, Opened::Verified(_))
    }

    pub fn into_plaintext(self) -> Option<String> {
        match self {
            Opened::Verified(plaintext) => Some(plaintext),
            Opened::Rejected(_) => None,
        }
    }
}

/// Sign `plaintext` with the sender's key and encrypt it for `recipient`.
///
/// The signature covers the plaintext, not the ciphertext.
pub fn seal(
    plaintext: &str,
    signer: &PrivateKey,
    recipient: &PublicKey,
) -> Result<Envelope, CryptoError> {
    let symmetric_key = Zeroizing::new(random_symmetric_key());

    let cipher_text = encrypt_payload(plaintext.as_bytes(), symmetric_key.as_bytes())?;
    let signature = signer.signing_key().sign(plaintext.as_bytes());
    let wrapped_key = wrap_key(symmetric_key.as_bytes(), recipient.agreement())?;

    Ok(Envelope {
        signature: STANDARD.encode(signature.to_bytes()),
        wrapped_key: STANDARD.encode(wrapped_key),
        cipher_text: STANDARD.encode(cipher_text),
    })
}

/// Decrypt an envelope addressed to `recipient` and check it was signed by
/// the holder of `verifier`.
pub fn open(envelope: &Envelope, verifier: &PublicKey, recipient: &PrivateKey) -> Opened {
    let (Ok(wrapped), Ok(cipher), Ok(signature)) = (
        STANDARD.decode(envelope.wrapped_key.trim()),
        STANDARD.decode(envelope.cipher_text.trim()),
        STANDARD.decode(envelope.signature.trim()),
    ) else {
        return Opened::Rejected(RejectReason::Malformed);
    };
    let Ok(signature) = Signature::from_slice(&signature) else {
        return Opened::Rejected(RejectReason::Malformed);
    };

    let symmetric_key = match unwrap_key(&wrapped, &recipient.agreement_secret()) {
        Ok(key) => key,
        Err(reason) => return Opened::Rejected(reason),
    };
    let plaintext = match decrypt_payload(&cipher, &symmetric_key) {
        Ok(bytes) => bytes,
        Err(reason) => return Opened::Rejected(reason),
    };
    if verifier.verifying().verify(&plaintext, &signature).is_err() {
        return Opened::Rejected(RejectReason::SignatureMismatch);
    }
    match String::from_utf8(plaintext) {
        Ok(text) => Opened::Verified(text),
        Err(_) => Opened::Rejected(RejectReason::Malformed),
    }
}

/// [`seal`] taking base64 key strings as stored in the organization directory.
pub fn seal_with_keys(
    plaintext: &str,
    signer_private: &str,
    recipient_public: &str,
) -> Result<Envelope, CryptoError> {
    let signer = PrivateKey::from_base64(signer_private)?;
    let recipient = PublicKey::from_base64(recipient_public)?;
    seal(plaintext, &signer, &recipient)
}

/// [`open`] taking base64 key strings. Only unparseable keys produce `Err`.
pub fn open_with_keys(
    envelope: &Envelope,
    verifier_public: &str,
    recipient_private: &str,
) -> Result<Opened, CryptoError> {
    let verifier = PublicKey::from_base64(verifier_public)?;
    let recipient = PrivateKey::from_base64(recipient_private)?;
    Ok(open(envelope, &verifier, &recipient))
}

fn random_symmetric_key() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(SYMMETRIC_KEY_LEN)
        .map(char::from)
        .collect()
}

fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn encrypt_payload(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128Gcm::new_from_slice(key).map_err(|e| CryptoError::Cipher(e.to_string()))?;
    let nonce = random_nonce();
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Cipher(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn decrypt_payload(data: &[u8], key: &[u8]) -> Result<Vec<u8>, RejectReason> {
    if data.len() < NONCE_LEN + TAG_LEN {
        return Err(RejectReason::Malformed);
    }
    let cipher = Aes128Gcm::new_from_slice(key).map_err(|_| RejectReason::KeyUnwrap)?;
    let (nonce, sealed) = data.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| RejectReason::Decrypt)
}

fn derive_wrap_key(
    shared: &[u8],
    ephemeral: &AgreementPublic,
    recipient: &AgreementPublic,
) -> Result<Zeroizing<[u8; 32]>, RejectReason> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral.as_bytes());
    salt[32..].copy_from_slice(recipient.as_bytes());
    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(WRAP_INFO, okm.as_mut_slice())
        .map_err(|_| RejectReason::KeyUnwrap)?;
    Ok(okm)
}

fn wrap_key(symmetric_key: &[u8], recipient: &AgreementPublic) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_public = AgreementPublic::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);

    let wrap = derive_wrap_key(shared.as_bytes(), &ephemeral_public, recipient)
        .map_err(|reason| CryptoError::Cipher(reason.to_string()))?;
    let cipher = Aes256Gcm::new_from_slice(wrap.as_slice())
        .map_err(|e| CryptoError::Cipher(e.to_string()))?;
    let nonce = random_nonce();
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), symmetric_key)
        .map_err(|e| CryptoError::Cipher(e.to_string()))?;

    let mut out = Vec::with_capacity(EPHEMERAL_LEN + NONCE_LEN + sealed.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn unwrap_key(wrapped: &[u8], secret: &StaticSecret) -> Result<Zeroizing<Vec<u8>>, RejectReason> {
    if wrapped.len() != EPHEMERAL_LEN + NONCE_LEN + SYMMETRIC_KEY_LEN + TAG_LEN {
        return Err(RejectReason::Malformed);
    }
    let mut ephemeral = [0u8; EPHEMERAL_LEN];
    ephemeral.copy_from_slice(&wrapped[..EPHEMERAL_LEN]);
    let ephemeral = AgreementPublic::from(ephemeral);
    let nonce = &wrapped[EPHEMERAL_LEN..EPHEMERAL_LEN + NONCE_LEN];
    let sealed = &wrapped[EPHEMERAL_LEN + NONCE_LEN..];

    let recipient = AgreementPublic::from(secret);
    let shared = secret.diffie_hellman(&ephemeral);
    let wrap = derive_wrap_key(shared.as_bytes(), &ephemeral, &recipient)?;
    let cipher =
        Aes256Gcm::new_from_slice(wrap.as_slice()).map_err(|_| RejectReason::KeyUnwrap)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map(Zeroizing::new)
        .map_err(|_| RejectReason::KeyUnwrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::PartyKeyPair;

    fn flip_byte(encoded: &str, index: usize) -> String {
        let mut bytes = STANDARD.decode(encoded).unwrap();
        let at = index % bytes.len();
        bytes[at] ^= 0x01;
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let sender = PartyKeyPair::generate();
        let receiver = PartyKeyPair::generate();
        let payload = r#"{"orgCode":"330100","items":[1,2,3]}"#;

        let envelope = seal(payload, &sender.private, &receiver.public).unwrap();
        let opened = open(&envelope, &sender.public, &receiver.private);
        assert_eq!(opened, Opened::Verified(payload.to_string()));
    }

    #[test]
    fn test_same_plaintext_yields_distinct_ciphertexts() {
        let sender = PartyKeyPair::generate();
        let receiver = PartyKeyPair::generate();
        let first = seal("repeat", &sender.private, &receiver.public).unwrap();
        let second = seal("repeat", &sender.private, &receiver.public).unwrap();
        assert_ne!(first.cipher_text, second.cipher_text);
        assert_ne!(first.wrapped_key, second.wrapped_key);
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let sender = PartyKeyPair::generate();
        let receiver = PartyKeyPair::generate();
        let mut envelope = seal("payload", &sender.private, &receiver.public).unwrap();
        envelope.signature = flip_byte(&envelope.signature, 5);

        let opened = open(&envelope, &sender.public, &receiver.private);
        assert_eq!(opened, Opened::Rejected(RejectReason::SignatureMismatch));
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let sender = PartyKeyPair::generate();
        let receiver = PartyKeyPair::generate();
        let envelope = seal("payload", &sender.private, &receiver.public).unwrap();

        for index in [0, 13, 20] {
            let mut tampered = envelope.clone();
            tampered.cipher_text = flip_byte(&envelope.cipher_text, index);
            assert!(!open(&tampered, &sender.public, &receiver.private).is_verified());
        }
    }

    #[test]
    fn test_wrong_verifier_is_rejected() {
        let sender = PartyKeyPair::generate();
        let impostor = PartyKeyPair::generate();
        let receiver = PartyKeyPair::generate();
        let envelope = seal("payload", &sender.private, &receiver.public).unwrap();

        let opened = open(&envelope, &impostor.public, &receiver.private);
        assert_eq!(opened, Opened::Rejected(RejectReason::SignatureMismatch));
    }

    #[test]
    fn test_wrong_recipient_cannot_unwrap() {
        let sender = PartyKeyPair::generate();
        let receiver = PartyKeyPair::generate();
        let bystander = PartyKeyPair::generate();
        let envelope = seal("payload", &sender.private, &receiver.public).unwrap();

        let opened = open(&envelope, &sender.public, &bystander.private);
        assert_eq!(opened, Opened::Rejected(RejectReason::KeyUnwrap));
    }

    #[test]
    fn test_garbage_fields_are_rejected_not_errors() {
        let sender = PartyKeyPair::generate();
        let receiver = PartyKeyPair::generate();
        let envelope = Envelope {
            signature: "%%%".into(),
            wrapped_key: "AAAA".into(),
            cipher_text: String::new(),
        };
        let opened = open(&envelope, &sender.public, &receiver.private);
        assert_eq!(opened, Opened::Rejected(RejectReason::Malformed));
    }

    #[test]
    fn test_string_keys_surface_format_errors() {
        let receiver = PartyKeyPair::generate();
        let result = seal_with_keys("x", "bad-key", &receiver.public.to_base64());
        assert!(matches!(result, Err(CryptoError::InvalidPrivateKey(_))));
    }

    #[test]
    fn test_zhangsan_scenario() {
        let a = PartyKeyPair::generate();
        let b = PartyKeyPair::generate();

        let envelope = seal_with_keys("zhangsan", &a.private.to_base64(), &b.public.to_base64())
            .unwrap();
        let opened =
            open_with_keys(&envelope, &a.public.to_base64(), &b.private.to_base64()).unwrap();
        assert_eq!(opened.into_plaintext().as_deref(), Some("zhangsan"));
    }
}
