//! Integration tests for how chat sessions end.
//!
//! Sentinels in any casing on either side, prompt shutdown while the local
//! user is idle, local interrupts, peer disconnects, and silence after
//! shutdown.
//!
//! Verification command: `cargo test --test session_termination`

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use rfchat::session::{
    Session, SessionConfig, SessionError, SessionEvent, SessionHandle, SessionState, Termination,
};
use rfchat::transport::loopback::{self, LoopbackTransport};
use rfchat::transport::{Transport, TransportError, TransportType};

// =============================================================================
// Test helpers
// =============================================================================

const WAIT: Duration = Duration::from_secs(5);

struct Running {
    input: mpsc::Sender<String>,
    events: mpsc::Receiver<SessionEvent>,
    handle: SessionHandle,
    task: JoinHandle<Result<Termination, SessionError>>,
}

impl Running {
    async fn finish(self) -> Result<Termination, SessionError> {
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("session ends in time")
            .expect("session task")
    }

    /// Drain events until the channel closes.
    async fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut all = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(WAIT, self.events.recv()).await {
            all.push(event);
        }
        all
    }
}

/// A plaintext session on one end of a loopback pair; the other end is
/// returned raw so the test can play the peer byte by byte.
fn start() -> (Running, LoopbackTransport) {
    let (a, raw_peer) = loopback::create_pair(4096);
    let (session, events) = Session::new(a, None, SessionConfig::default());
    let handle = session.handle();
    let (input, input_rx) = mpsc::channel(8);
    let task = tokio::spawn(session.run(input_rx));
    (
        Running {
            input,
            events,
            handle,
            task,
        },
        raw_peer,
    )
}

/// A transport whose peer has vanished: every write fails, reads wait
/// until the transport is closed.
struct FailingWrites {
    closed: watch::Sender<bool>,
    close_calls: Arc<AtomicUsize>,
}

impl FailingWrites {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let (closed, _) = watch::channel(false);
        (
            Self {
                closed,
                close_calls: Arc::clone(&close_calls),
            },
            close_calls,
        )
    }
}

impl Transport for FailingWrites {
    async fn read(&self, _max_bytes: usize) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        loop {
            let is_closed = *closed.borrow_and_update();
            if is_closed || closed.changed().await.is_err() {
                break;
            }
        }
        Err(TransportError::ConnectionClosed)
    }

    async fn write(&self, _bytes: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "peer vanished",
        )))
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Loopback
    }

    fn peer(&self) -> &str {
        "vanished-peer"
    }
}

async fn wait_running(handle: &SessionHandle) {
    let deadline = Instant::now() + WAIT;
    while !handle.is_running() {
        assert!(Instant::now() < deadline, "session never became active");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// Sentinels
// =============================================================================

#[tokio::test]
async fn peer_sentinel_in_any_casing_ends_the_session() {
    for sentinel in ["quit", "QUIT", "Exit", "exit", "  quit\r\n"] {
        let (running, raw_peer) = start();
        raw_peer.write(sentinel.as_bytes()).await.unwrap();

        assert_eq!(
            running.finish().await.unwrap(),
            Termination::PeerQuit,
            "sentinel {sentinel:?}"
        );
        // The session closed its end; the peer sees end of stream.
        assert_eq!(raw_peer.read(1024).await.unwrap(), None);
    }
}

#[tokio::test]
async fn local_sentinel_in_any_casing_is_sent_and_ends_the_session() {
    for (typed, on_wire) in [
        ("quit", "quit"),
        ("QUIT", "QUIT"),
        ("Exit", "Exit"),
        ("exit", "exit"),
        ("  quit  ", "quit"),
    ] {
        let (running, raw_peer) = start();
        running.input.send(typed.to_string()).await.unwrap();

        let bytes = raw_peer.read(1024).await.unwrap().expect("sentinel bytes");
        assert_eq!(bytes, on_wire.as_bytes(), "typed {typed:?}");
        assert_eq!(running.finish().await.unwrap(), Termination::LocalQuit);
        assert_eq!(raw_peer.read(1024).await.unwrap(), None);
    }
}

#[tokio::test]
async fn sentinel_inside_a_sentence_is_just_text() {
    let (mut running, raw_peer) = start();
    raw_peer.write(b"I will quit tomorrow").await.unwrap();

    let event = tokio::time::timeout(WAIT, running.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, SessionEvent::PeerMessage { text, .. } if text == "I will quit tomorrow"));
    assert!(running.handle.is_running());

    raw_peer.close().await;
    assert_eq!(running.finish().await.unwrap(), Termination::PeerClosed);
}

// =============================================================================
// Prompt shutdown
// =============================================================================

#[tokio::test]
async fn peer_quit_ends_session_while_local_user_is_idle() {
    let (running, raw_peer) = start();
    wait_running(&running.handle).await;

    // The input sender stays alive: the send loop is blocked waiting for a
    // line that never comes.
    let started = Instant::now();
    raw_peer.write(b"quit").await.unwrap();

    let reason = tokio::time::timeout(Duration::from_secs(1), running.task)
        .await
        .expect("both loops end within the poll interval")
        .unwrap()
        .unwrap();
    assert_eq!(reason, Termination::PeerQuit);
    assert!(started.elapsed() < Duration::from_secs(1));
    drop(running.input);
}

#[tokio::test]
async fn interrupt_closes_without_sending_a_sentinel() {
    let (running, raw_peer) = start();
    wait_running(&running.handle).await;

    assert!(running.handle.interrupt());
    assert!(!running.handle.interrupt(), "second interrupt is a no-op");

    let handle = running.handle.clone();
    assert_eq!(running.finish().await.unwrap(), Termination::Interrupted);
    assert_eq!(handle.state(), SessionState::Closed(Termination::Interrupted));

    // Nothing but end of stream reaches the peer.
    assert_eq!(raw_peer.read(1024).await.unwrap(), None);
}

#[tokio::test]
async fn peer_disconnect_is_reported_as_peer_closed() {
    let (mut running, raw_peer) = start();
    raw_peer.close().await;

    let events = running.drain_events().await;
    assert_eq!(events, vec![SessionEvent::Closed(Termination::PeerClosed)]);
    assert_eq!(running.finish().await.unwrap(), Termination::PeerClosed);
}

#[tokio::test]
async fn handle_closed_resolves_after_shutdown() {
    let (running, raw_peer) = start();
    let handle = running.handle.clone();
    raw_peer.write(b"exit").await.unwrap();

    tokio::time::timeout(WAIT, handle.closed())
        .await
        .expect("closed in time");
    assert!(!handle.is_running());
    assert_eq!(handle.state(), SessionState::Closed(Termination::PeerQuit));
    running.finish().await.unwrap();
}

#[tokio::test]
async fn write_failure_ends_session_as_connection_lost() {
    let (transport, close_calls) = FailingWrites::new();
    let (session, mut events) = Session::new(transport, None, SessionConfig::default());
    let handle = session.handle();
    let (input, input_rx) = mpsc::channel(1);
    input.send("hello".to_string()).await.unwrap();

    let outcome = tokio::time::timeout(WAIT, session.run(input_rx))
        .await
        .expect("session ends in time");

    assert!(matches!(
        outcome,
        Err(SessionError::Transport(TransportError::Io(ref e))) if e.kind() == io::ErrorKind::BrokenPipe
    ));
    assert_eq!(handle.state(), SessionState::Closed(Termination::ConnectionLost));
    assert!(close_calls.load(Ordering::SeqCst) >= 1, "transport was closed");

    // No echo for the failed line; the only event is the final one.
    let mut all = Vec::new();
    while let Some(event) = events.recv().await {
        all.push(event);
    }
    assert_eq!(all, vec![SessionEvent::Closed(Termination::ConnectionLost)]);
}

// =============================================================================
// Input handling
// =============================================================================

#[tokio::test]
async fn blank_lines_are_never_transmitted() {
    let (mut running, raw_peer) = start();
    for line in ["", "   ", "\t", "hello"] {
        running.input.send(line.to_string()).await.unwrap();
    }

    let bytes = raw_peer.read(1024).await.unwrap().unwrap();
    assert_eq!(bytes, b"hello");

    let event = tokio::time::timeout(WAIT, running.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, SessionEvent::LocalEcho { text, .. } if text == "hello"));

    raw_peer.close().await;
    let rest = running.drain_events().await;
    assert_eq!(rest, vec![SessionEvent::Closed(Termination::PeerClosed)]);
}

#[tokio::test]
async fn end_of_local_input_keeps_receiving() {
    let (mut running, raw_peer) = start();
    wait_running(&running.handle).await;
    let (closed_input, _) = mpsc::channel::<String>(1);
    drop(std::mem::replace(&mut running.input, closed_input));

    raw_peer.write(b"still there?").await.unwrap();
    let event = tokio::time::timeout(WAIT, running.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, SessionEvent::PeerMessage { text, .. } if text == "still there?"));
    assert!(running.handle.is_running());

    raw_peer.write(b"quit").await.unwrap();
    assert_eq!(running.finish().await.unwrap(), Termination::PeerQuit);
}

// =============================================================================
// After shutdown
// =============================================================================

#[tokio::test]
async fn nothing_is_sent_or_emitted_after_shutdown() {
    let (mut running, raw_peer) = start();
    raw_peer.write(b"quit").await.unwrap();

    let events = running.drain_events().await;
    assert_eq!(events, vec![SessionEvent::Closed(Termination::PeerQuit)]);

    // Late input has nowhere to go.
    assert!(running.input.send("too late".to_string()).await.is_err());
    assert_eq!(raw_peer.read(1024).await.unwrap(), None);

    // Writing into a closed session does not revive it.
    let _ = raw_peer.write(b"anyone?").await;
    assert_eq!(running.handle.state(), SessionState::Closed(Termination::PeerQuit));
    assert_eq!(running.finish().await.unwrap(), Termination::PeerQuit);
}

#[tokio::test]
async fn closed_transport_rejects_io() {
    let (a, _b) = loopback::create_pair(64);
    a.close().await;
    assert!(matches!(
        a.write(b"x").await,
        Err(TransportError::ConnectionClosed)
    ));
    assert!(matches!(a.read(16).await, Err(TransportError::ConnectionClosed)));
}
