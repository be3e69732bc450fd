//! Property tests for the line protocol's classification rules.
//!
//! Uses proptest to verify:
//! 1. Arbitrary bytes never cause a panic in `Inbound::decode`.
//! 2. Sentinels are recognised under any casing and surrounding whitespace.
//! 3. Whitespace-only lines are always classified as blank.
//! 4. Non-sentinel text survives inbound decoding unchanged (modulo trimming).

use proptest::prelude::*;
use rfchat_proto::wire::{Inbound, Outbound, is_sentinel, preview};

/// Strategy for a sentinel word with random per-character casing.
fn arb_sentinel() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("quit"), Just("exit")],
        prop::collection::vec(any::<bool>(), 4),
    )
        .prop_map(|(word, upper)| {
            word.chars()
                .zip(upper)
                .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
                .collect()
        })
}

/// Strategy for ASCII whitespace padding.
fn arb_padding() -> impl Strategy<Value = String> {
    "[ \t\r\n]{0,4}"
}

proptest! {
    #[test]
    fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = Inbound::decode(&bytes);
    }

    #[test]
    fn sentinel_detected_with_any_casing_and_padding(
        word in arb_sentinel(),
        left in arb_padding(),
        right in arb_padding(),
    ) {
        let padded = format!("{left}{word}{right}");
        prop_assert!(is_sentinel(&padded));
        prop_assert_eq!(Inbound::decode(padded.as_bytes()), Inbound::Sentinel);
        prop_assert_eq!(Outbound::classify(&padded), Outbound::Sentinel(word.as_str()));
    }

    #[test]
    fn whitespace_lines_are_blank(line in "[ \t\r\n]{0,32}") {
        prop_assert_eq!(Outbound::classify(&line), Outbound::Blank);
    }

    #[test]
    fn text_survives_inbound_decode(text in "[a-zA-Z0-9][a-zA-Z0-9 ,.!?]{0,200}[a-zA-Z0-9]") {
        prop_assume!(!is_sentinel(&text));
        prop_assert_eq!(Inbound::decode(text.as_bytes()), Inbound::Text(text.clone()));
        prop_assert_eq!(Outbound::classify(&text), Outbound::Text(text.as_str()));
    }

    #[test]
    fn preview_is_a_prefix(text in "\\PC{0,120}", max in 0usize..80) {
        let shown = preview(&text, max);
        let body = shown.strip_suffix("...").unwrap_or(&shown);
        prop_assert!(text.starts_with(body));
        prop_assert!(body.chars().count() <= max);
    }
}
