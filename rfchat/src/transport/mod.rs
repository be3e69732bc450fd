//! Transport layer abstraction for `rfchat`.
//!
//! Defines the [`Transport`] trait every connected byte stream satisfies.
//! Concrete implementations include:
//! - [`tcp`]: TCP socket, used as a stand-in for Bluetooth in tests and
//!   on machines without an adapter
//! - `rfcomm`: Bluetooth RFCOMM socket via BlueZ (`bluetooth` feature)
//! - [`loopback`]: in-process duplex pair for testing
//!
//! All of them are [`stream::StreamTransport`] over a different tokio
//! stream, so they share one read/write/close implementation.

pub mod endpoint;
pub mod loopback;
#[cfg(feature = "bluetooth")]
pub mod rfcomm;
pub mod stream;
pub mod tcp;

use std::fmt;
use std::future::Future;
use std::time::Duration;

pub use endpoint::Endpoint;

/// Describes which kind of transport is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// Bluetooth RFCOMM socket.
    Rfcomm,
    /// TCP socket.
    Tcp,
    /// In-process loopback for testing.
    Loopback,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rfcomm => write!(f, "RFCOMM"),
            Self::Tcp => write!(f, "TCP"),
            Self::Loopback => write!(f, "Loopback"),
        }
    }
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Establishing the connection failed (refused, unreachable, ...).
    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        /// The endpoint that was attempted.
        endpoint: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The connection attempt did not complete in time.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The transport has been closed locally.
    #[error("connection closed")]
    ConnectionClosed,

    /// An endpoint string could not be parsed.
    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),

    /// The transport kind is not available in this build.
    #[error("{0} transport is not supported in this build")]
    Unsupported(TransportType),

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A connected, bidirectional byte stream.
///
/// Reads and writes may run concurrently from different tasks: the two
/// directions never wait on each other.
///
/// # Invariant
///
/// [`close`](Transport::close) is idempotent and safe to call while a read
/// or write is pending. Once it has been called, pending and future reads
/// and writes return [`TransportError::ConnectionClosed`] promptly.
pub trait Transport: Send + Sync {
    /// Read at most `max_bytes` bytes.
    ///
    /// Returns whatever one underlying read delivers, which may be shorter
    /// than `max_bytes`. Returns `Ok(None)` when the peer has closed its
    /// write side.
    fn read(
        &self,
        max_bytes: usize,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Write all of `bytes`.
    fn write(&self, bytes: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the transport. The peer observes end-of-stream.
    fn close(&self) -> impl Future<Output = ()> + Send;

    /// Whether [`close`](Transport::close) has been called.
    fn is_closed(&self) -> bool;

    /// Return the type of this transport.
    fn transport_type(&self) -> TransportType;

    /// Printable address of the remote end.
    fn peer(&self) -> &str;
}

/// Run a connect future under `timeout`, mapping elapsed time to
/// [`TransportError::Timeout`].
pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    connect: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
}
