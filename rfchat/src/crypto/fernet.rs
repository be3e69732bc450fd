//! Fernet-format authenticated tokens.
//!
//! Token layout (all big-endian):
//!
//! ```text
//! 0x80 | timestamp (8) | IV (16) | AES-128-CBC ciphertext (n * 16) | HMAC-SHA256 (32)
//! ```
//!
//! The HMAC covers every byte before it. The 32-byte key splits into a
//! signing half (first 16 bytes) and an encryption half (last 16 bytes).
//! Tokens are rendered as padded URL-safe base64.

use aes::Aes128;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::CryptoError;
use super::kdf::DERIVED_KEY_LEN;

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Token format version byte.
pub const VERSION: u8 = 0x80;

/// Length of the AES initialisation vector.
pub const IV_LEN: usize = 16;

const TIMESTAMP_LEN: usize = 8;
const HEADER_LEN: usize = 1 + TIMESTAMP_LEN + IV_LEN;
const BLOCK_LEN: usize = 16;
const MAC_LEN: usize = 32;
const HALF_KEY_LEN: usize = DERIVED_KEY_LEN / 2;

/// Fernet key material. Both halves are wiped on drop; the HMAC state is
/// rebuilt per token and never outlives the call.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FernetKey {
    signing_key: [u8; HALF_KEY_LEN],
    encryption_key: [u8; HALF_KEY_LEN],
}

impl FernetKey {
    /// Split 32 bytes of key material into signing and encryption halves.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeySetup`] if the MAC rejects the signing key.
    pub fn from_bytes(key: &[u8; DERIVED_KEY_LEN]) -> Result<Self, CryptoError> {
        let mut signing_key = [0u8; HALF_KEY_LEN];
        let mut encryption_key = [0u8; HALF_KEY_LEN];
        signing_key.copy_from_slice(&key[..HALF_KEY_LEN]);
        encryption_key.copy_from_slice(&key[HALF_KEY_LEN..]);
        let key = Self {
            signing_key,
            encryption_key,
        };
        key.mac()?;
        Ok(key)
    }

    fn mac(&self) -> Result<HmacSha256, CryptoError> {
        <HmacSha256 as Mac>::new_from_slice(&self.signing_key)
            .map_err(|e| CryptoError::KeySetup(e.to_string()))
    }

    /// Seal `plaintext` into a token with the given creation time and IV.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the block cipher cannot be
    /// initialised.
    pub fn seal(
        &self,
        plaintext: &[u8],
        timestamp: u64,
        iv: [u8; IV_LEN],
    ) -> Result<String, CryptoError> {
        let ciphertext = Aes128CbcEnc::new_from_slices(&self.encryption_key, &iv)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len() + MAC_LEN);
        token.push(VERSION);
        token.extend_from_slice(&timestamp.to_be_bytes());
        token.extend_from_slice(&iv);
        token.extend_from_slice(&ciphertext);

        let mut mac = self.mac()?;
        mac.update(&token);
        token.extend_from_slice(&mac.finalize().into_bytes());

        Ok(URL_SAFE.encode(token))
    }

    /// Verify and decrypt a token.
    ///
    /// The MAC is checked (in constant time) before any decryption.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidEncoding`] if `token` is not base64.
    /// - [`CryptoError::MalformedToken`] if the layout, version, or padding
    ///   is wrong.
    /// - [`CryptoError::AuthenticationFailed`] if the MAC does not verify.
    pub fn open(&self, token: &str) -> Result<Vec<u8>, CryptoError> {
        let raw = URL_SAFE
            .decode(token)
            .map_err(|e| CryptoError::InvalidEncoding(format!("token: {e}")))?;

        let body_len = raw
            .len()
            .checked_sub(HEADER_LEN + MAC_LEN)
            .filter(|len| *len >= BLOCK_LEN && len % BLOCK_LEN == 0)
            .ok_or_else(|| CryptoError::MalformedToken(format!("bad length {}", raw.len())))?;

        if raw[0] != VERSION {
            return Err(CryptoError::MalformedToken(format!(
                "unsupported version 0x{:02x}",
                raw[0]
            )));
        }

        let (signed, tag) = raw.split_at(HEADER_LEN + body_len);
        let mut mac = self.mac()?;
        mac.update(signed);
        mac.verify_slice(tag)
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        let iv = &signed[1 + TIMESTAMP_LEN..HEADER_LEN];
        let ciphertext = &signed[HEADER_LEN..];
        Aes128CbcDec::new_from_slices(&self.encryption_key, iv)
            .map_err(|e| CryptoError::MalformedToken(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::MalformedToken("invalid padding".to_string()))
    }
}
