//! Loopback transport for testing.
//!
//! Uses an in-process [`tokio::io::duplex`] pipe to simulate a connection
//! between two endpoints. Created via [`create_pair`], which returns two
//! connected ends: bytes written on one are read on the other.

use tokio::io::DuplexStream;

use super::TransportType;
use super::stream::StreamTransport;

/// In-process transport backed by a duplex pipe.
pub type LoopbackTransport = StreamTransport<DuplexStream>;

/// Create a pair of connected loopback transports.
///
/// `capacity` is the number of bytes buffered per direction before writes
/// wait for the reader.
///
/// # Example
///
/// ```rust,no_run
/// use rfchat::transport::Transport;
/// use rfchat::transport::loopback;
///
/// # async fn example() {
/// let (alice, bob) = loopback::create_pair(4096);
/// alice.write(b"hello").await.unwrap();
/// let data = bob.read(1024).await.unwrap();
/// assert_eq!(data.as_deref(), Some(&b"hello"[..]));
/// # }
/// ```
#[must_use]
pub fn create_pair(capacity: usize) -> (LoopbackTransport, LoopbackTransport) {
    let (a, b) = tokio::io::duplex(capacity);
    (
        StreamTransport::new(a, TransportType::Loopback, "loopback-b"),
        StreamTransport::new(b, TransportType::Loopback, "loopback-a"),
    )
}
