//! Per-session encryption state.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::CryptoError;
use super::fernet::{FernetKey, IV_LEN};
use super::kdf;

/// Turns a shared password into per-message confidentiality and integrity.
///
/// Wire text is the Fernet token wrapped once more in standard base64, so it
/// is printable ASCII and interoperates with existing peers that use the
/// same password.
#[derive(Clone)]
pub struct EncryptionContext {
    key: FernetKey,
}

impl EncryptionContext {
    /// Derive a context from `password` (PBKDF2-HMAC-SHA256, fixed salt,
    /// 100,000 iterations).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeySetup`] if the derived key is rejected.
    pub fn derive(password: &str) -> Result<Self, CryptoError> {
        let derived = kdf::derive_key(password);
        let key = FernetKey::from_bytes(&derived)?;
        tracing::debug!("encryption key derived");
        Ok(Self { key })
    }

    /// Encrypt one message into wire text.
    ///
    /// Never fails. If sealing fails (not expected with a derived key) the
    /// plaintext is returned unchanged and an error is logged; the peer
    /// will then see an undecryptable message rather than the session
    /// aborting.
    #[must_use]
    pub fn encrypt(&self, plaintext: &str) -> String {
        match self.try_encrypt(plaintext) {
            Ok(wire) => wire,
            Err(e) => {
                tracing::error!(error = %e, "encryption failed, sending plaintext");
                plaintext.to_owned()
            }
        }
    }

    /// Encrypt one message into wire text, surfacing failures.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the token cannot be sealed.
    pub fn try_encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let iv: [u8; IV_LEN] = rand::random();
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        let token = self.key.seal(plaintext.as_bytes(), now, iv)?;
        Ok(STANDARD.encode(token))
    }

    /// Decrypt wire text back into the original message.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidEncoding`] if either base64 layer is invalid.
    /// - [`CryptoError::AuthenticationFailed`] on a wrong key or tampering.
    /// - [`CryptoError::MalformedToken`] if the token or the recovered
    ///   plaintext is structurally invalid.
    pub fn decrypt(&self, wire_text: &str) -> Result<String, CryptoError> {
        let outer = STANDARD
            .decode(wire_text.trim())
            .map_err(|e| CryptoError::InvalidEncoding(format!("wire text: {e}")))?;
        let token = std::str::from_utf8(&outer)
            .map_err(|_| CryptoError::InvalidEncoding("token is not ASCII".to_string()))?;
        let plaintext = self.key.open(token)?;
        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::MalformedToken("plaintext is not UTF-8".to_string()))
    }

    /// Whether a key was derived. Always `true` for a constructed context;
    /// sessions without encryption hold no context at all.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        true
    }
}

impl fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("key", &"<redacted>")
            .finish()
    }
}
