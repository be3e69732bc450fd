//! Send loop: local input lines → transport.

use tokio::sync::mpsc;

use rfchat_proto::wire::Outbound;

use super::{Session, SessionEvent, Termination};
use crate::transport::{Transport, TransportError};

impl<T: Transport> Session<T> {
    /// Send local input lines until the session stops or input ends.
    ///
    /// End of input stops only this loop; the session keeps receiving
    /// until the peer or an interrupt ends it.
    pub(super) async fn send_loop(
        &self,
        mut input: mpsc::Receiver<String>,
    ) -> Result<(), TransportError> {
        loop {
            let line = tokio::select! {
                biased;
                () = self.lifecycle.stopped() => return Ok(()),
                line = input.recv() => line,
            };
            let Some(line) = line else {
                tracing::debug!("local input ended");
                return Ok(());
            };
            if !self.lifecycle.is_running() {
                return Ok(());
            }

            match Outbound::classify(&line) {
                Outbound::Blank => {}
                Outbound::Sentinel(sentinel) => {
                    // Sentinels go out unencrypted so any peer recognizes them.
                    if let Err(error) = self.transport.write(sentinel.as_bytes()).await {
                        return self.fail(error);
                    }
                    tracing::debug!("sent quit sentinel");
                    self.lifecycle.terminate(Termination::LocalQuit);
                    return Ok(());
                }
                Outbound::Text(text) => {
                    let wire = self
                        .encryption
                        .as_ref()
                        .map_or_else(|| text.to_string(), |ctx| ctx.encrypt(text));
                    if let Err(error) = self.transport.write(wire.as_bytes()).await {
                        return self.fail(error);
                    }
                    self.emit(SessionEvent::LocalEcho {
                        label: self.config.local_label.clone(),
                        text: text.to_string(),
                        encrypted: self.is_encrypted(),
                    })
                    .await;
                }
            }
        }
    }
}
