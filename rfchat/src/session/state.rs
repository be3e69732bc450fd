//! Session lifecycle: `Idle → Active → Terminating → Closed`.
//!
//! The state lives in a `watch` channel shared by the receive loop, the send
//! loop, the supervisor and any [`SessionHandle`](super::SessionHandle).
//! "Running" means `Active`. The first termination request wins; the state
//! never returns to `Active`.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The local user sent a sentinel.
    LocalQuit,
    /// The peer sent a sentinel.
    PeerQuit,
    /// The peer closed its side of the stream.
    PeerClosed,
    /// The local user interrupted the session (e.g. Ctrl-C).
    Interrupted,
    /// A transport read or write failed.
    ConnectionLost,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalQuit => write!(f, "you left the chat"),
            Self::PeerQuit => write!(f, "peer left the chat"),
            Self::PeerClosed => write!(f, "peer closed the connection"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::ConnectionLost => write!(f, "connection lost"),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, loops not started.
    Idle,
    /// Both loops running.
    Active,
    /// Termination requested; loops are winding down.
    Terminating(Termination),
    /// Transport released.
    Closed(Termination),
}

impl SessionState {
    /// The termination reason, once there is one.
    #[must_use]
    pub const fn termination(self) -> Option<Termination> {
        match self {
            Self::Terminating(reason) | Self::Closed(reason) => Some(reason),
            Self::Idle | Self::Active => None,
        }
    }
}

/// Shared, monotonic lifecycle cell.
#[derive(Clone)]
pub(crate) struct Lifecycle {
    state: Arc<watch::Sender<SessionState>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            state: Arc::new(state),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// `Idle → Active`. Returns `false` if termination already happened.
    pub(crate) fn activate(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Active;
                true
            } else {
                false
            }
        })
    }

    /// Request termination. Returns `true` only for the call that won.
    pub(crate) fn terminate(&self, reason: Termination) -> bool {
        let won = self.state.send_if_modified(|state| match state {
            SessionState::Idle | SessionState::Active => {
                *state = SessionState::Terminating(reason);
                true
            }
            SessionState::Terminating(_) | SessionState::Closed(_) => false,
        });
        if won {
            tracing::info!(reason = ?reason, "session terminating");
        }
        won
    }

    /// `Terminating → Closed`, returning the final reason.
    pub(crate) fn close(&self) -> Termination {
        // Reaching close without a reason means the loops ended on their
        // own; record it as a local interruption.
        self.terminate(Termination::Interrupted);
        let mut reason = Termination::Interrupted;
        self.state.send_modify(|state| {
            if let SessionState::Terminating(r) | SessionState::Closed(r) = *state {
                reason = r;
            }
            *state = SessionState::Closed(reason);
        });
        reason
    }

    /// Resolve once the session is no longer `Idle` or `Active`.
    pub(crate) async fn stopped(&self) {
        self.wait_for(|state| state.termination().is_some()).await;
    }

    /// Resolve once the session is `Closed`.
    pub(crate) async fn closed(&self) {
        self.wait_for(|state| matches!(state, SessionState::Closed(_)))
            .await;
    }

    async fn wait_for(&self, done: impl Fn(SessionState) -> bool) {
        let mut rx = self.state.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if done(current) || rx.changed().await.is_err() {
                return;
            }
        }
    }
}
