//! Shared wire rules for the `rfchat` line protocol.
//!
//! The protocol has no framing: one transport read is one message. This
//! crate holds the pieces both endpoints must agree on (sentinels, read size,
//! classification of inbound payloads and outbound lines).

pub mod wire;
