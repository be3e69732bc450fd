//! Bluetooth RFCOMM transport via BlueZ.
//!
//! Only built with the `bluetooth` feature (Linux). Service advertisement
//! and discovery are out of scope: the caller supplies the device address
//! and channel.

use std::time::Duration;

use bluer::Address;
use bluer::rfcomm::{Listener, SocketAddr, Stream};

use super::stream::StreamTransport;
use super::{TransportError, TransportType, with_timeout};

/// A connected RFCOMM stream.
pub type RfcommTransport = StreamTransport<Stream>;

/// Connect to `address` on `channel`, giving up after `timeout`.
///
/// # Errors
///
/// Returns [`TransportError::InvalidEndpoint`] for a malformed address,
/// [`TransportError::Connect`] if the device refuses or is unreachable, and
/// [`TransportError::Timeout`] if the attempt does not complete in time.
pub async fn connect(
    address: &str,
    channel: u8,
    timeout: Duration,
) -> Result<RfcommTransport, TransportError> {
    let addr: Address = address
        .parse()
        .map_err(|_| TransportError::InvalidEndpoint(address.to_string()))?;
    let endpoint = format!("{addr}/{channel}");
    let stream = with_timeout(timeout, async {
        Stream::connect(SocketAddr::new(addr, channel))
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.clone(),
                source,
            })
    })
    .await?;
    tracing::info!(peer = %endpoint, "RFCOMM connected");
    Ok(StreamTransport::new(stream, TransportType::Rfcomm, endpoint))
}

/// Listens for a single chat peer on an RFCOMM channel.
pub struct RfcommAcceptor {
    listener: Listener,
}

impl RfcommAcceptor {
    /// Bind `channel` on any local adapter.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the channel cannot be bound.
    pub async fn bind(channel: u8) -> Result<Self, TransportError> {
        let listener = Listener::bind(SocketAddr::new(Address::any(), channel)).await?;
        Ok(Self { listener })
    }

    /// Wait for the next incoming connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if accepting fails.
    pub async fn accept(&self) -> Result<RfcommTransport, TransportError> {
        let (stream, remote) = self.listener.accept().await?;
        let peer = format!("{}/{}", remote.addr, remote.channel);
        tracing::info!(peer = %peer, "accepted RFCOMM connection");
        Ok(StreamTransport::new(stream, TransportType::Rfcomm, peer))
    }
}
