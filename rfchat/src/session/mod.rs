//! The session engine.
//!
//! A [`Session`] owns one connected [`Transport`] and an optional
//! [`EncryptionContext`], and drives three concurrent activities until one
//! side ends the chat:
//!
//! 1. the **receive loop** reads peer messages, decrypts, and emits
//!    [`SessionEvent`]s;
//! 2. the **send loop** consumes local input lines, encrypts, and writes
//!    them; sends the sentinel on `quit`/`exit`;
//! 3. the **supervisor** waits for termination (polling at a fixed
//!    interval) and closes the transport so a blocked read returns.
//!
//! ```text
//! local input ──► send loop ──► Transport ──► peer
//! UI events   ◄── receive loop ◄── Transport ◄── peer
//!                      ▲
//!            supervisor ── closes on termination
//! ```
//!
//! Termination is cooperative: whichever loop sees a sentinel, end of
//! stream, or transport failure moves the shared lifecycle to
//! `Terminating`; the others observe it and exit.

pub mod input;
mod receive;
mod send;
pub mod state;

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use rfchat_proto::wire::{DEFAULT_PREVIEW_CHARS, MAX_READ_SIZE};

use crate::crypto::{CryptoError, EncryptionContext};
use crate::transport::{Transport, TransportError};

use state::Lifecycle;
pub use state::{SessionState, Termination};

/// Errors that end a session abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A transport read or write failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Key setup failed before the session started.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Per-session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Label shown on messages typed locally.
    pub local_label: String,
    /// Label shown on messages from the peer.
    pub peer_label: String,
    /// How often the supervisor re-checks the lifecycle.
    pub poll_interval: Duration,
    /// Characters of an undecryptable payload to show.
    pub preview_chars: usize,
    /// Capacity of the event channel.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_label: "Me".to_string(),
            peer_label: "Peer".to_string(),
            poll_interval: Duration::from_secs(1),
            preview_chars: DEFAULT_PREVIEW_CHARS,
            event_buffer: 64,
        }
    }
}

/// Events emitted by a [`Session`] for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A message from the peer.
    PeerMessage {
        /// Peer label.
        label: String,
        /// Message text (decrypted if encryption is enabled).
        text: String,
        /// Whether the message arrived encrypted.
        encrypted: bool,
    },
    /// A peer message that failed to decrypt.
    Undecryptable {
        /// Peer label.
        label: String,
        /// Truncated prefix of the raw wire text.
        preview: String,
    },
    /// A local message that was just sent.
    LocalEcho {
        /// Local label.
        label: String,
        /// Message text as typed.
        text: String,
        /// Whether it was sent encrypted.
        encrypted: bool,
    },
    /// The session is over. Always the last event.
    Closed(Termination),
}

/// A cloneable handle for observing and interrupting a running session.
#[derive(Clone)]
pub struct SessionHandle {
    lifecycle: Lifecycle,
}

impl SessionHandle {
    /// Request termination as a local interrupt.
    ///
    /// Returns `false` if the session was already terminating.
    pub fn interrupt(&self) -> bool {
        self.lifecycle.terminate(Termination::Interrupted)
    }

    /// Whether the session is `Active`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Wait until the session has released its transport.
    pub async fn closed(&self) {
        self.lifecycle.closed().await;
    }
}

/// One chat session over one transport.
pub struct Session<T: Transport> {
    id: Uuid,
    transport: T,
    encryption: Option<EncryptionContext>,
    config: SessionConfig,
    lifecycle: Lifecycle,
    events: mpsc::Sender<SessionEvent>,
}

impl<T: Transport> Session<T> {
    /// Create a session over a connected transport.
    ///
    /// Returns the session and the receiver for its [`SessionEvent`]s.
    /// Pass `None` for `encryption` to chat in plaintext.
    pub fn new(
        transport: T,
        encryption: Option<EncryptionContext>,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let session = Self {
            id: Uuid::now_v7(),
            transport,
            encryption,
            config,
            lifecycle: Lifecycle::new(),
            events,
        };
        (session, event_rx)
    }

    /// Unique id of this session (also recorded on its tracing span).
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Bytes requested per transport read; one read is one message.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub const fn read_size(&self) -> usize {
        MAX_READ_SIZE
    }

    /// Whether messages are encrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// A handle for interrupting or observing the session.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            lifecycle: self.lifecycle.clone(),
        }
    }

    /// Run the session to completion.
    ///
    /// Lines received on `input` are sent to the peer. Consuming `self`
    /// guarantees one receive loop and one send loop per session. The
    /// transport is closed on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] if a transport failure ended the
    /// session. Cooperative endings return `Ok` with the reason.
    pub async fn run(self, input: mpsc::Receiver<String>) -> Result<Termination, SessionError> {
        let span = tracing::info_span!(
            "session",
            id = %self.id,
            transport = %self.transport.transport_type(),
            peer = %self.transport.peer(),
            encrypted = self.is_encrypted(),
        );
        self.run_inner(input).instrument(span).await
    }

    async fn run_inner(self, input: mpsc::Receiver<String>) -> Result<Termination, SessionError> {
        if !self.lifecycle.activate() {
            tracing::info!("terminated before start");
            return self.finish(Ok(())).await;
        }
        tracing::info!("session active");

        let (received, sent, ()) = tokio::join!(
            self.receive_loop(),
            self.send_loop(input),
            self.supervise(),
        );
        self.finish(received.and(sent)).await
    }

    /// Release the transport, publish `Closed`, and pick the outcome.
    async fn finish(
        &self,
        outcome: Result<(), TransportError>,
    ) -> Result<Termination, SessionError> {
        self.transport.close().await;
        let reason = self.lifecycle.close();
        let _ = self.events.send(SessionEvent::Closed(reason)).await;
        tracing::info!(reason = ?reason, "session closed");
        outcome.map(|()| reason).map_err(SessionError::from)
    }

    /// Wait for termination, then close the transport so that a read
    /// blocked in the receive loop returns.
    async fn supervise(&self) {
        loop {
            let stopped =
                tokio::time::timeout(self.config.poll_interval, self.lifecycle.stopped()).await;
            if stopped.is_ok() || !self.lifecycle.is_running() {
                break;
            }
            tracing::trace!("session still active");
        }
        self.transport.close().await;
    }

    /// Emit a display event, unless the session has stopped running.
    async fn emit(&self, event: SessionEvent) {
        if !self.lifecycle.is_running() {
            return;
        }
        if self.events.send(event).await.is_err() {
            tracing::debug!("event receiver dropped");
        }
    }

    /// Record a transport failure. Failures after termination are the
    /// expected fallout of closing and are swallowed.
    fn fail(&self, error: TransportError) -> Result<(), TransportError> {
        if self.lifecycle.terminate(Termination::ConnectionLost) {
            tracing::warn!(error = %error, "transport failure");
            Err(error)
        } else {
            tracing::debug!(error = %error, "transport error after termination");
            Ok(())
        }
    }
}
