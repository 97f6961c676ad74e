//! WebSocket transport for the session core.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/{room_id}`
//! 2. The socket is split: the sending half becomes the connection's
//!    [`MessageSink`], the receiving half is decoded into a stream of
//!    [`ClientEvent`]s
//! 3. Both are handed to the orchestrator, which owns the connection until
//!    the client goes away
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws/lobby');
//! ws.onopen = () => ws.send(JSON.stringify({
//!   event_type: "create-room",
//!   client_name: "alice",
//!   avatar_url: ""
//! }));
//! ws.onmessage = (event) => console.log(JSON.parse(event.data));
//! ```

use async_trait::async_trait;
use axum::{
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cepex::room::{ClientEvent, MessageSink, ReadError, ServerEvent, TransportError};
use futures_util::{SinkExt, Stream, StreamExt, stream::SplitSink};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};
use tracing::{debug, info, warn};

use super::AppState;
use crate::{logging, metrics};

/// Room IDs longer than this are refused before the upgrade.
pub const MAX_ROOM_ID_LENGTH: usize = 64;

/// Upgrade HTTP connection to a WebSocket bound to `room_id`.
///
/// # Response
///
/// On success, upgrades connection to WebSocket protocol (101 Switching Protocols).
/// Returns `400 Bad Request` for an unusable room ID.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if !is_valid_room_id(&room_id) {
        return (StatusCode::BAD_REQUEST, "Invalid room id").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, room_id, state))
}

fn is_valid_room_id(room_id: &str) -> bool {
    !room_id.trim().is_empty()
        && room_id.len() <= MAX_ROOM_ID_LENGTH
        && !room_id.chars().any(char::is_control)
}

async fn handle_socket(socket: WebSocket, room_id: String, state: AppState) {
    let started = Instant::now();
    let received = Arc::new(AtomicU64::new(0));
    metrics::websocket_connection_opened();
    info!("WebSocket connected: room={}", room_id);

    let (sender, receiver) = socket.split();
    let sink = WsSink { sender };
    let inbound = Box::pin(decode_stream(receiver, received.clone()));

    state
        .orchestrator
        .clone()
        .serve_connection(room_id.clone(), inbound, sink)
        .await;

    metrics::websocket_connection_closed();
    metrics::active_rooms(state.orchestrator.room_count());
    logging::log_session_closed(
        &room_id,
        started.elapsed().as_millis() as u64,
        received.load(Ordering::Relaxed),
    );
}

/// Turn raw frames into client events.
///
/// Going-away and abnormal closes are expected; any other close code ends the
/// stream with [`ReadError::UnexpectedClose`]. Control frames are skipped.
fn decode_stream<S>(
    receiver: S,
    received: Arc<AtomicU64>,
) -> impl Stream<Item = Result<ClientEvent, ReadError>> + Send
where
    S: Stream<Item = Result<Message, axum::Error>> + Send,
{
    receiver.filter_map(move |frame| {
        let received = received.clone();
        async move {
            let item = match frame {
                Ok(Message::Text(text)) => parse(text.as_str().as_bytes()),
                Ok(Message::Binary(bytes)) => parse(&bytes),
                Ok(Message::Close(frame)) => Err(classify_close(frame)),
                Ok(Message::Ping(_) | Message::Pong(_)) => return None,
                Err(e) => Err(ReadError::Transport(e.to_string())),
            };
            if item.is_ok() {
                received.fetch_add(1, Ordering::Relaxed);
                metrics::websocket_messages_received();
            }
            Some(item)
        }
    })
}

fn parse(payload: &[u8]) -> Result<ClientEvent, ReadError> {
    serde_json::from_slice(payload).map_err(|e| {
        metrics::websocket_messages_malformed();
        debug!("Failed to parse client message: {}", e);
        ReadError::Malformed(e.to_string())
    })
}

fn classify_close(frame: Option<CloseFrame>) -> ReadError {
    match frame {
        None => ReadError::ExpectedClose,
        Some(frame) if frame.code == close_code::AWAY || frame.code == close_code::ABNORMAL => {
            ReadError::ExpectedClose
        }
        Some(frame) => {
            ReadError::UnexpectedClose(format!("{} {}", frame.code, frame.reason.as_str()))
        }
    }
}

/// Sending half of a WebSocket. Each event goes out as one JSON text frame.
struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl MessageSink for WsSink {
    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError> {
        let json = serde_json::to_string(event)?;
        self.sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        metrics::websocket_messages_sent();
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.sender.close().await {
            warn!("Failed to close WebSocket: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_validation() {
        assert!(is_valid_room_id("lobby"));
        assert!(is_valid_room_id("R1"));
        assert!(!is_valid_room_id("   "));
        assert!(!is_valid_room_id(&"x".repeat(MAX_ROOM_ID_LENGTH + 1)));
        assert!(!is_valid_room_id("bad\nid"));
    }

    #[test]
    fn test_close_classification() {
        assert!(matches!(classify_close(None), ReadError::ExpectedClose));
        let away = CloseFrame {
            code: close_code::AWAY,
            reason: "".into(),
        };
        assert!(matches!(classify_close(Some(away)), ReadError::ExpectedClose));
        let policy = CloseFrame {
            code: close_code::POLICY,
            reason: "bye".into(),
        };
        assert!(matches!(
            classify_close(Some(policy)),
            ReadError::UnexpectedClose(_)
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse(b"not json"), Err(ReadError::Malformed(_))));
        assert!(matches!(
            parse(br#"{"event_type":"start-game"}"#),
            Ok(ClientEvent::StartGame)
        ));
    }
}
