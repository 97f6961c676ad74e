//! Session and transport error types.

use thiserror::Error;

use super::messages::ConnId;
use crate::game::{GameError, entities::RoomId};

/// Errors raised while handling a client request
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    #[error("connection {conn} is not registered in room {room_id}")]
    NotRegistered { room_id: RoomId, conn: ConnId },

    #[error("room {0} does not exist")]
    RoomNotFound(RoomId),

    /// Server-wide room ceiling reached
    #[error("server is full ({max_rooms} rooms)")]
    ServerFull { max_rooms: usize },

    #[error("already joined a room")]
    AlreadyJoined,

    #[error("message is empty")]
    EmptyMessage,
}

impl SessionError {
    /// Reason string safe to show the client.
    pub fn client_message(&self) -> String {
        match self {
            Self::NotRegistered { .. } => "you are not in a room".to_string(),
            Self::RoomNotFound(_) => "room does not exist".to_string(),
            Self::ServerFull { .. } => "server is full".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors writing to a connection. Fatal for that connection only.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("send failed: {0}")]
    Send(String),
}

/// Errors reading from a connection
#[derive(Debug, Error)]
pub enum ReadError {
    /// Payload could not be decoded. The connection stays open.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Peer went away or the socket dropped (going-away / abnormal close).
    #[error("connection closed")]
    ExpectedClose,

    /// Any other close code.
    #[error("connection closed unexpectedly: {0}")]
    UnexpectedClose(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_errors_pass_through() {
        let err = SessionError::from(GameError::NotYourTurn);
        assert_eq!(err.client_message(), "please wait for your turn");
    }

    #[test]
    fn test_client_messages_hide_internals() {
        let err = SessionError::NotRegistered {
            room_id: "R1".to_string(),
            conn: 7,
        };
        assert_eq!(err.client_message(), "you are not in a room");
        assert_eq!(
            SessionError::RoomNotFound("R1".to_string()).client_message(),
            "room does not exist"
        );
        assert_eq!(
            SessionError::ServerFull { max_rooms: 3 }.client_message(),
            "server is full"
        );
    }
}
