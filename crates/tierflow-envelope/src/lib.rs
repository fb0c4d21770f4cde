//! Hybrid sign-then-encrypt envelope for cross-tier payloads.
//!
//! A sender signs the plaintext with its Ed25519 key, encrypts it under a
//! fresh 16-character symmetric key with AES-128-GCM, and wraps that key for
//! the recipient through an ephemeral X25519 exchange (HKDF-SHA256,
//! AES-256-GCM). The receiver unwraps, decrypts and verifies; a failed check
//! comes back as [`Opened::Rejected`] rather than an error.
//!
//! Every ciphertext carries its own random nonce. This envelope does not
//! interoperate with peers still speaking the unauthenticated block-mode
//! variant of the protocol.

mod codec;
mod error;
mod keys;

pub use codec::{
    open, open_with_keys, seal, seal_with_keys, Envelope, Opened, RejectReason,
    SYMMETRIC_KEY_LEN,
};
pub use error::CryptoError;
pub use keys::{PartyKeyPair, PrivateKey, PublicKey, PUBLIC_KEY_LEN};
