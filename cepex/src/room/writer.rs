//! Connection writer: the only task allowed to write to a connection.

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{errors::TransportError, messages::ConnId, messages::ServerEvent};
use crate::game::entities::RoomId;

/// Outgoing half of a transport.
#[async_trait]
pub trait MessageSink: Send {
    /// Write one event as a single framed message.
    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError>;

    async fn close(&mut self);
}

/// Releases a connection's registration. Both hooks must tolerate repeated
/// calls.
#[async_trait]
pub trait Unregister: Send + Sync {
    /// A leave acknowledgment went out, or could not be queued. Unbinds the
    /// connection unless it has been bound to a seated player since.
    async fn departed(&self, room_id: &str, conn: ConnId);

    /// The writer stopped. Unbinds the connection and evicts its player.
    async fn unregister(&self, room_id: &str, conn: ConnId);
}

/// In-memory sink backed by an unbounded channel. Closing drops the sender.
pub struct ChannelSink {
    sender: Option<mpsc::UnboundedSender<ServerEvent>>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError> {
        let sender = self.sender.as_ref().ok_or(TransportError::Closed)?;
        sender
            .send(event.clone())
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        self.sender = None;
    }
}

pub struct ConnectionWriter<S> {
    room_id: RoomId,
    conn: ConnId,
    sink: S,
    queue: mpsc::Receiver<ServerEvent>,
    registrar: Arc<dyn Unregister>,
}

impl<S: MessageSink> ConnectionWriter<S> {
    pub fn new(
        room_id: RoomId,
        conn: ConnId,
        sink: S,
        queue: mpsc::Receiver<ServerEvent>,
        registrar: Arc<dyn Unregister>,
    ) -> Self {
        Self {
            room_id,
            conn,
            sink,
            queue,
            registrar,
        }
    }

    /// Drain the queue into the sink until it closes or a write fails.
    pub async fn run(mut self) {
        while let Some(event) = self.queue.recv().await {
            if let Err(e) = self.sink.send(&event).await {
                warn!(
                    "Room {}: write to connection {} failed: {}",
                    self.room_id, self.conn, e
                );
                break;
            }

            // The acknowledgment is on the wire, so the connection can go.
            if matches!(event, ServerEvent::LeftRoom { .. }) {
                self.registrar.departed(&self.room_id, self.conn).await;
            }
        }

        self.sink.close().await;
        self.registrar.unregister(&self.room_id, self.conn).await;
        debug!("Room {}: writer for connection {} done", self.room_id, self.conn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(&'static str, RoomId, ConnId)>>,
    }

    #[async_trait]
    impl Unregister for Recorder {
        async fn unregister(&self, room_id: &str, conn: ConnId) {
            self.calls
                .lock()
                .unwrap()
                .push(("unregister", room_id.to_string(), conn));
        }

        async fn departed(&self, room_id: &str, conn: ConnId) {
            self.calls
                .lock()
                .unwrap()
                .push(("departed", room_id.to_string(), conn));
        }
    }

    struct FailingSink;

    #[async_trait]
    impl MessageSink for FailingSink {
        async fn send(&mut self, _event: &ServerEvent) -> Result<(), TransportError> {
            Err(TransportError::Send("broken pipe".to_string()))
        }

        async fn close(&mut self) {}
    }

    fn note(message: &str) -> ServerEvent {
        ServerEvent::Notification {
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_writes_in_order_then_unregisters_on_close() {
        let recorder = Arc::new(Recorder::default());
        let (sink, mut written) = ChannelSink::new();
        let (tx, rx) = mpsc::channel(8);
        let writer = ConnectionWriter::new("R1".to_string(), 3, sink, rx, recorder.clone());

        tx.send(note("a")).await.unwrap();
        tx.send(note("b")).await.unwrap();
        drop(tx);
        writer.run().await;

        assert_eq!(written.recv().await, Some(note("a")));
        assert_eq!(written.recv().await, Some(note("b")));
        assert_eq!(written.recv().await, None);
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec![("unregister", "R1".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_unregisters_after_leave_acknowledgment() {
        let recorder = Arc::new(Recorder::default());
        let (sink, mut written) = ChannelSink::new();
        let (tx, rx) = mpsc::channel(8);
        let writer = ConnectionWriter::new("R1".to_string(), 1, sink, rx, recorder.clone());
        let task = tokio::spawn(writer.run());

        tx.send(ServerEvent::LeftRoom {
            room_id: "R1".to_string(),
            kicked: false,
        })
        .await
        .unwrap();
        assert!(matches!(
            written.recv().await,
            Some(ServerEvent::LeftRoom { .. })
        ));

        drop(tx);
        task.await.unwrap();
        // Once after the acknowledgment and once on termination.
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec![
                ("departed", "R1".to_string(), 1),
                ("unregister", "R1".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_write_failure_terminates() {
        let recorder = Arc::new(Recorder::default());
        let (tx, rx) = mpsc::channel(8);
        let writer = ConnectionWriter::new("R1".to_string(), 5, FailingSink, rx, recorder.clone());

        tx.send(note("a")).await.unwrap();
        tx.send(note("b")).await.unwrap();
        // Returns without the sender being dropped.
        writer.run().await;

        assert_eq!(recorder.calls.lock().unwrap().len(), 1);
        assert!(tx.is_closed());
    }
}
