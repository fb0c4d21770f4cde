//! Party key material.
//!
//! Every participant (city node, this node, the national node) owns one
//! 32-byte seed. The seed is the Ed25519 signing key; the X25519 secret used
//! to unwrap symmetric keys is derived from it, so a party publishes a single
//! public key string carrying both halves.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as AgreementPublic, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;

const SEED_LEN: usize = 32;
const AGREEMENT_DOMAIN: &[u8] = b"tierflow-ed25519-to-x25519-v1";

/// Encoded public key length in bytes: Ed25519 verifying key followed by the
/// X25519 public key.
pub const PUBLIC_KEY_LEN: usize = 64;

/// A party's public half: signature verification plus key agreement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    verifying: VerifyingKey,
    agreement: AgreementPublic,
}

impl PublicKey {
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(CryptoError::InvalidPublicKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            )));
        }
        let mut verifying = [0u8; 32];
        verifying.copy_from_slice(&bytes[..32]);
        let mut agreement = [0u8; 32];
        agreement.copy_from_slice(&bytes[32..]);

        let verifying = VerifyingKey::from_bytes(&verifying)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self {
            verifying,
            agreement: AgreementPublic::from(agreement),
        })
    }

    pub fn to_base64(&self) -> String {
        let mut bytes = Vec::with_capacity(PUBLIC_KEY_LEN);
        bytes.extend_from_slice(self.verifying.as_bytes());
        bytes.extend_from_slice(self.agreement.as_bytes());
        STANDARD.encode(bytes)
    }

    pub(crate) fn verifying(&self) -> &VerifyingKey {
        &self.verifying
    }

    pub(crate) fn agreement(&self) -> &AgreementPublic {
        &self.agreement
    }
}

/// A party's private seed.
#[derive(Clone)]
pub struct PrivateKey {
    seed: Zeroizing<[u8; SEED_LEN]>,
}

impl PrivateKey {
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?,
        );
        if bytes.len() != SEED_LEN {
            return Err(CryptoError::InvalidPrivateKey(format!(
                "expected {} bytes, got {}",
                SEED_LEN,
                bytes.len()
            )));
        }
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        seed.copy_from_slice(&bytes);
        Ok(Self { seed })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.seed.as_slice())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying: self.signing_key().verifying_key(),
            agreement: AgreementPublic::from(&self.agreement_secret()),
        }
    }

    pub(crate) fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.seed)
    }

    pub(crate) fn agreement_secret(&self) -> StaticSecret {
        let mut hasher = Sha256::new();
        hasher.update(AGREEMENT_DOMAIN);
        hasher.update(self.seed.as_slice());
        let derived: [u8; 32] = hasher.finalize().into();
        StaticSecret::from(derived)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Freshly generated key pair, mostly used when registering a participant.
#[derive(Clone, Debug)]
pub struct PartyKeyPair {
    pub private: PrivateKey,
    pub public: PublicKey,
}

impl PartyKeyPair {
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        OsRng.fill_bytes(seed.as_mut_slice());
        let private = PrivateKey { seed };
        let public = private.public_key();
        Self { private, public }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_base64_roundtrip() {
        let pair = PartyKeyPair::generate();
        let encoded = pair.public.to_base64();
        let decoded = PublicKey::from_base64(&encoded).unwrap();
        assert_eq!(decoded, pair.public);
    }

    #[test]
    fn test_private_key_derives_same_public() {
        let pair = PartyKeyPair::generate();
        let restored = PrivateKey::from_base64(&pair.private.to_base64()).unwrap();
        assert_eq!(restored.public_key(), pair.public);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let short = STANDARD.encode([7u8; 10]);
        assert!(matches!(
            PublicKey::from_base64(&short),
            Err(CryptoError::InvalidPublicKey(_))
        ));
        assert!(matches!(
            PrivateKey::from_base64(&short),
            Err(CryptoError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_rejects_non_base64() {
        assert!(PublicKey::from_base64("not base64 at all!").is_err());
    }
}
