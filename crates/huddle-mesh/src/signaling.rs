//! WebSocket client for the huddle relay.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use huddle_common::{ClientMessage, RelayMessage, SignalingError};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

/// What the writer task puts on the socket.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outbound {
    Message(ClientMessage),
    Close,
}

/// Sending half of a relay connection. Inbound frames are delivered on the
/// receiver returned by [`SignalingClient::connect`].
#[derive(Clone)]
pub struct SignalingClient {
    tx: mpsc::UnboundedSender<Outbound>,
}

/// Join `room_code` at `relay_url` (`ws://host:port`).
pub fn room_url(relay_url: &str, room_code: &str) -> String {
    format!("{}/{}", relay_url.trim_end_matches('/'), room_code)
}

impl SignalingClient {
    pub async fn connect(
        relay_url: &str,
        room_code: &str,
        timeout: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RelayMessage>), SignalingError> {
        let url = room_url(relay_url, room_code);
        info!(url = %url, "Connecting to relay");

        let ws = match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(&url)).await
        {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => return Err(SignalingError::Connect(e.to_string())),
            Err(_) => {
                return Err(SignalingError::Connect(format!(
                    "timed out after {}s",
                    timeout.as_secs()
                )))
            }
        };

        let (mut write, mut read) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<RelayMessage>();

        // Outgoing messages
        tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                let frame = match outbound {
                    Outbound::Message(msg) => match msg.encode() {
                        Ok(json) => WsMessage::Text(json.into()),
                        Err(e) => {
                            warn!(error = %e, "Failed to encode relay message");
                            continue;
                        }
                    },
                    Outbound::Close => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                };
                if write.send(frame).await.is_err() {
                    break;
                }
            }
        });

        // Incoming messages
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match RelayMessage::decode(&text) {
                        Ok(msg) => {
                            if in_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Dropping malformed relay frame"),
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "Relay socket error");
                        break;
                    }
                }
            }
            info!("Relay connection closed");
        });

        Ok((Self { tx: out_tx }, in_rx))
    }

    /// Wrap an existing outbound queue.
    pub(crate) fn from_sender(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    pub fn send(&self, msg: ClientMessage) -> Result<(), SignalingError> {
        self.tx
            .send(Outbound::Message(msg))
            .map_err(|_| SignalingError::Closed)
    }

    /// Close the socket after everything queued so far is written.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}
