//! Property-based tests for the encryption layer.
//!
//! Uses proptest to verify:
//! 1. Any message survives encrypt → decrypt under the same password.
//! 2. Wire text is printable ASCII and never equals the plaintext.
//! 3. A context derived from a different password never authenticates.
//! 4. Arbitrary (possibly garbage) wire text fails cleanly, never panics.
//! 5. Flipping any byte of the token is detected.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use proptest::prelude::*;

use rfchat::crypto::{CryptoError, EncryptionContext};

static ALICE: LazyLock<EncryptionContext> =
    LazyLock::new(|| EncryptionContext::derive("correct horse").expect("derive"));
static MALLORY: LazyLock<EncryptionContext> =
    LazyLock::new(|| EncryptionContext::derive("battery staple").expect("derive"));

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn round_trips_any_message(message in "\\PC{0,512}") {
        let wire = ALICE.encrypt(&message);
        prop_assert_eq!(ALICE.decrypt(&wire).unwrap(), message);
    }

    #[test]
    fn wire_text_is_printable_and_opaque(message in "[a-z ]{1,128}") {
        let wire = ALICE.encrypt(&message);
        prop_assert!(wire.bytes().all(|b| b.is_ascii_graphic()));
        prop_assert_ne!(&wire, &message);
    }

    #[test]
    fn wrong_password_never_decrypts(message in "\\PC{1,256}") {
        let wire = ALICE.encrypt(&message);
        let result = MALLORY.decrypt(&wire);
        prop_assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn garbage_wire_text_fails_cleanly(garbage in "\\PC{0,300}") {
        if let Err(e) = ALICE.decrypt(&garbage) {
            prop_assert!(e.is_decryption_failure());
        }
    }

    #[test]
    fn tampering_is_detected(message in "[a-z]{1,64}", index in any::<prop::sample::Index>(), flip in 1u8..=255) {
        let wire = ALICE.encrypt(&message);
        let token = STANDARD.decode(&wire).unwrap();
        let mut raw = base64::engine::general_purpose::URL_SAFE.decode(&token).unwrap();
        let at = index.index(raw.len());
        raw[at] ^= flip;
        let tampered = STANDARD.encode(base64::engine::general_purpose::URL_SAFE.encode(&raw));
        prop_assert!(ALICE.decrypt(&tampered).is_err());
    }
}
