//! Password-based message encryption for `rfchat`.
//!
//! [`EncryptionContext`] is the only place plaintext is turned into wire
//! text and back. Keys come from a shared password via PBKDF2-HMAC-SHA256
//! ([`kdf`]); each message becomes a self-contained authenticated token
//! ([`fernet`]) carrying its own IV and MAC.
//!
//! A session either has a context or it does not: there is no
//! "half-enabled" state to check at every call site.

pub mod context;
pub mod fernet;
pub mod kdf;

pub use context::EncryptionContext;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The derived key was rejected while building the cipher state.
    ///
    /// Fatal: the session must not start.
    #[error("key setup failed: {0}")]
    KeySetup(String),

    /// Sealing a token failed. Not expected with a valid key.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The wire text is not valid base64 at one of its two layers.
    #[error("invalid wire encoding: {0}")]
    InvalidEncoding(String),

    /// The MAC did not verify (wrong password, corruption, or tampering).
    #[error("authentication failed: wrong key or tampered message")]
    AuthenticationFailed,

    /// The token decoded and authenticated but is structurally unusable.
    #[error("malformed token: {0}")]
    MalformedToken(String),
}

impl CryptoError {
    /// Returns `true` for the failures a receiver recovers from locally.
    #[must_use]
    pub const fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidEncoding(_) | Self::AuthenticationFailed | Self::MalformedToken(_)
        )
    }
}
