//! TCP transport.
//!
//! Behaves exactly like the RFCOMM transport, so the whole session engine
//! can be exercised over `127.0.0.1` without a Bluetooth adapter.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use super::stream::StreamTransport;
use super::{TransportError, TransportType, with_timeout};

/// A connected TCP stream.
pub type TcpTransport = StreamTransport<TcpStream>;

/// Connect to `addr`, giving up after `timeout`.
///
/// Makes a single attempt; there is no retry.
///
/// # Errors
///
/// Returns [`TransportError::Connect`] if the connection is refused or the
/// address is unreachable, and [`TransportError::Timeout`] if it does not
/// complete in time.
pub async fn connect(addr: &str, timeout: Duration) -> Result<TcpTransport, TransportError> {
    let stream = with_timeout(timeout, async {
        TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: addr.to_string(),
                source,
            })
    })
    .await?;
    wrap(stream)
}

/// Listens for a single chat peer.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Bind a listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the address cannot be bound.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// The address actually bound (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the next incoming connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if accepting fails.
    pub async fn accept(&self) -> Result<TcpTransport, TransportError> {
        let (stream, remote) = self.listener.accept().await?;
        tracing::info!(peer = %remote, "accepted TCP connection");
        wrap(stream)
    }
}

fn wrap(stream: TcpStream) -> Result<TcpTransport, TransportError> {
    // One write, one segment: the protocol has no framing.
    stream.set_nodelay(true)?;
    let peer = stream.peer_addr()?.to_string();
    Ok(StreamTransport::new(stream, TransportType::Tcp, peer))
}
