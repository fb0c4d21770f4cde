use thiserror::Error;

/// Failures caused by unusable key material or cipher setup.
///
/// A signature that does not match is *not* a `CryptoError`; see
/// [`Opened::Rejected`](crate::Opened::Rejected).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("cipher failure: {0}")]
    Cipher(String),
}
