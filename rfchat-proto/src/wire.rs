//! Message classification for the unframed line protocol.
//!
//! A message is whatever a single transport read returns, decoded as UTF-8
//! and trimmed. Two reserved words (`quit`, `exit`) act as sentinels that end
//! the session on both sides; they are compared case-insensitively after
//! trimming, on the sending side as well as the receiving side.

/// Maximum number of bytes consumed by one transport read.
///
/// A longer message is delivered as several messages; there is no
/// reassembly.
pub const MAX_READ_SIZE: usize = 1024;

/// Reserved words that request session termination.
pub const SENTINELS: [&str; 2] = ["quit", "exit"];

/// Number of characters of an undecryptable payload shown to the user.
pub const DEFAULT_PREVIEW_CHARS: usize = 50;

/// Returns `true` if `text` is a termination sentinel.
///
/// Surrounding whitespace is ignored and the comparison is case-insensitive,
/// so `" QUIT\n"` and `"Exit"` both match.
#[must_use]
pub fn is_sentinel(text: &str) -> bool {
    let folded = text.trim().to_lowercase();
    SENTINELS.contains(&folded.as_str())
}

/// A payload received from the peer, after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The peer asked to end the session.
    Sentinel,
    /// Any other text, trimmed. May be raw text or encrypted wire text.
    Text(String),
}

impl Inbound {
    /// Decode the bytes of one transport read.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected: a read can
    /// split a multi-byte character, and one garbled message must not end
    /// the session.
    #[must_use]
    pub fn decode(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        let trimmed = text.trim();
        if is_sentinel(trimmed) {
            Self::Sentinel
        } else {
            Self::Text(trimmed.to_owned())
        }
    }
}

/// A line of local input, classified for sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound<'a> {
    /// A termination sentinel (trimmed, original casing). Always sent
    /// unencrypted.
    Sentinel(&'a str),
    /// Empty or whitespace-only. Never transmitted.
    Blank,
    /// A chat message, exactly as typed.
    Text(&'a str),
}

impl<'a> Outbound<'a> {
    /// Classify one line of local input.
    #[must_use]
    pub fn classify(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Self::Blank
        } else if is_sentinel(trimmed) {
            Self::Sentinel(trimmed)
        } else {
            Self::Text(line)
        }
    }
}

/// Render a short prefix of `text` for display, followed by `...`.
///
/// Truncation counts characters, not bytes, so the cut never lands inside a
/// multi-byte sequence.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    let end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(idx, _)| idx);
    format!("{}...", &text[..end])
}
