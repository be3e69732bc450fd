//! Receive loop: transport → [`SessionEvent`]s.

use rfchat_proto::wire::{self, Inbound};

use super::{Session, SessionEvent, Termination};
use crate::transport::{Transport, TransportError};

impl<T: Transport> Session<T> {
    /// Read peer messages until the session stops.
    ///
    /// Each read is treated as one complete message. A sentinel or end of
    /// stream terminates the session; a message that fails to decrypt is
    /// reported and skipped.
    pub(super) async fn receive_loop(&self) -> Result<(), TransportError> {
        while self.lifecycle.is_running() {
            let bytes = match self.transport.read(self.read_size()).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    tracing::debug!("peer closed the stream");
                    self.lifecycle.terminate(Termination::PeerClosed);
                    return Ok(());
                }
                Err(error) => return self.fail(error),
            };

            if !self.lifecycle.is_running() {
                break;
            }

            match Inbound::decode(&bytes) {
                Inbound::Sentinel => {
                    tracing::debug!("peer sent a quit sentinel");
                    self.lifecycle.terminate(Termination::PeerQuit);
                }
                Inbound::Text(text) => self.deliver(text).await,
            }
        }
        Ok(())
    }

    async fn deliver(&self, text: String) {
        let label = self.config.peer_label.clone();
        let Some(encryption) = &self.encryption else {
            self.emit(SessionEvent::PeerMessage {
                label,
                text,
                encrypted: false,
            })
            .await;
            return;
        };

        match encryption.decrypt(&text) {
            Ok(plaintext) => {
                self.emit(SessionEvent::PeerMessage {
                    label,
                    text: plaintext,
                    encrypted: true,
                })
                .await;
            }
            Err(error) => {
                if error.is_decryption_failure() {
                    tracing::warn!(error = %error, len = text.len(), "could not decrypt message");
                } else {
                    tracing::error!(error = %error, "decryption setup failed");
                }
                self.emit(SessionEvent::Undecryptable {
                    label,
                    preview: wire::preview(&text, self.config.preview_chars),
                })
                .await;
            }
        }
    }
}
