//! Key derivation from a shared password.
//!
//! Both endpoints must end up with the same key from the same password, and
//! no key exchange happens on the wire, so the salt is a fixed,
//! application-wide constant. This keeps wire compatibility with existing
//! peers; it also means a given password yields the same key in every
//! session.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Application-wide PBKDF2 salt.
pub const KDF_SALT: &[u8] = b"bluetooth_chat_salt_2024";

/// PBKDF2 iteration count.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Length of the derived key in bytes.
pub const DERIVED_KEY_LEN: usize = 32;

/// A derived key, wiped from memory when dropped.
pub type DerivedKey = Zeroizing<[u8; DERIVED_KEY_LEN]>;

/// Derive the 32-byte session key for `password`.
///
/// CPU-bound (100k HMAC rounds); callers on an async runtime should run it
/// on a blocking thread.
#[must_use]
pub fn derive_key(password: &str) -> DerivedKey {
    derive_key_with(password.as_bytes(), KDF_SALT, KDF_ITERATIONS)
}

/// Derive a key with explicit salt and iteration count.
#[must_use]
pub fn derive_key_with(password: &[u8], salt: &[u8], iterations: u32) -> DerivedKey {
    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key[..]);
    key
}
