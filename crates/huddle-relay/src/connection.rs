//! Per-connection handler: upgrade, join the room, then route frames.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use huddle_common::ClientMessage;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use crate::room::{RoomStore, MEMBER_QUEUE};

const MAX_CODE_LEN: usize = 64;

/// Extract the room code from a request path.
///
/// Accepts `/<code>` and `/room/<code>`; a query string is ignored. Codes are
/// lowercased and must be 1-64 characters of `[a-z0-9-]`.
pub fn parse_room_code(path: &str) -> Option<String> {
    let path = path.split('?').next().unwrap_or_default();
    let path = path.trim_start_matches('/');
    let code = path
        .strip_prefix("room/")
        .unwrap_or(path)
        .trim_end_matches('/');

    let code = code.to_ascii_lowercase();
    let valid = !code.is_empty()
        && code.len() <= MAX_CODE_LEN
        && code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    valid.then_some(code)
}

/// Upgrade a raw TCP stream, rejecting requests without a valid room code.
pub async fn accept(stream: TcpStream, addr: SocketAddr, store: RoomStore) {
    let mut code: Option<String> = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        match parse_room_code(req.uri().path()) {
            Some(parsed) => {
                code = Some(parsed);
                Ok(resp)
            }
            None => {
                let mut err = ErrorResponse::new(Some("missing or invalid room code".into()));
                *err.status_mut() = StatusCode::NOT_FOUND;
                Err(err)
            }
        }
    };

    let result = accept_hdr_async(stream, callback).await;
    match (result, code) {
        (Ok(ws), Some(code)) => handle_connection(ws, addr, code, store).await,
        (Ok(_), None) => {
            tracing::warn!(peer = %addr, "Handshake accepted without a room code");
        }
        (Err(e), _) => {
            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
        }
    }
}

/// Run one member's connection until either side closes.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    code: String,
    store: RoomStore,
) {
    let (mut sink, mut stream) = ws.split();

    let (tx, mut rx) = mpsc::channel::<String>(MEMBER_QUEUE);
    let (room, peer_id) = store.join(&code, tx).await;

    tracing::info!(peer = %addr, room = %code, id = %peer_id, "Client registered");

    loop {
        tokio::select! {
            // Frames queued by the room -> this client's socket
            queued = rx.recv() => {
                let Some(msg) = queued else {
                    // The room dropped us for falling behind.
                    break;
                };
                if sink.send(Message::Text(msg.into())).await.is_err() {
                    break;
                }
            }

            // This client's socket -> the room
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match ClientMessage::decode(&text) {
                            Ok(msg) => room.lock().await.handle(&peer_id, msg),
                            Err(e) => {
                                tracing::warn!(room = %code, id = %peer_id, error = %e, "Malformed message dropped");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::info!(peer = %addr, room = %code, id = %peer_id, "Client disconnected");
    store.leave(&room, &peer_id).await;
}
