//! Generic [`Transport`] over any tokio byte stream.
//!
//! The stream is split into a read half and a write half, each behind its
//! own lock, so the receive loop and the send loop never contend. Closing
//! is signalled through a `watch` channel that every pending read and write
//! selects on.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, watch};

use super::{Transport, TransportError, TransportType};

/// A [`Transport`] backed by a tokio stream `S`.
pub struct StreamTransport<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    /// `true` once [`Transport::close`] has been called.
    closed: watch::Sender<bool>,
    kind: TransportType,
    peer: String,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap a connected stream.
    pub fn new(stream: S, kind: TransportType, peer: impl Into<String>) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let (closed, _) = watch::channel(false);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed,
            kind,
            peer: peer.into(),
        }
    }
}

/// Resolve once the close flag is set.
async fn wait_closed(mut closed: watch::Receiver<bool>) {
    loop {
        let is_closed = *closed.borrow_and_update();
        if is_closed || closed.changed().await.is_err() {
            return;
        }
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn read(&self, max_bytes: usize) -> Result<Option<Vec<u8>>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        let mut buf = vec![0u8; max_bytes];
        let read = async {
            let mut reader = self.reader.lock().await;
            reader.read(&mut buf).await
        };
        tokio::select! {
            result = read => {
                let n = result?;
                if n == 0 {
                    return Ok(None);
                }
                buf.truncate(n);
                Ok(Some(buf))
            }
            () = wait_closed(self.closed.subscribe()) => Err(TransportError::ConnectionClosed),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.write_all(bytes).await?;
            writer.flush().await
        };
        tokio::select! {
            result = write => result.map_err(TransportError::from),
            () = wait_closed(self.closed.subscribe()) => Err(TransportError::ConnectionClosed),
        }
    }

    async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        tracing::debug!(peer = %self.peer, transport = %self.kind, "closing transport");
        // Pending writes have released the lock by now: they select on the
        // flag set above.
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::debug!(error = %e, "shutdown after close failed");
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn transport_type(&self) -> TransportType {
        self.kind
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}
