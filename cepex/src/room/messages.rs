//! Wire events and switch envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::game::{
    RoomView,
    entities::{Card, Hand, PlayerId, PlayerIdentity, RoomId},
};

/// Server-assigned handle for one live connection.
pub type ConnId = u64;

/// Sending half of a connection's outbound queue.
pub type Outbox = mpsc::Sender<ServerEvent>;

fn default_is_add() -> bool {
    true
}

/// Events a client may send. The room is named by the connection's URL.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "kebab-case")]
pub enum ClientEvent {
    CreateRoom {
        #[serde(default)]
        client_name: String,
        #[serde(default)]
        avatar_url: String,
    },
    JoinRoom {
        #[serde(default)]
        client_name: String,
        #[serde(default)]
        avatar_url: String,
    },
    LeaveRoom,
    KickPlayer {
        player_id: PlayerId,
    },
    StartGame,
    PlayCard {
        hand_index: usize,
        #[serde(default = "default_is_add")]
        is_add: bool,
        #[serde(default)]
        target_player_id: Option<PlayerId>,
    },
    Chat {
        message: String,
    },
}

impl ClientEvent {
    /// Wire name of the event, echoed back in failures.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create-room",
            Self::JoinRoom { .. } => "join-room",
            Self::LeaveRoom => "leave-room",
            Self::KickPlayer { .. } => "kick-player",
            Self::StartGame => "start-game",
            Self::PlayCard { .. } => "play-card",
            Self::Chat { .. } => "chat",
        }
    }
}

/// Events the server sends to clients
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "kebab-case")]
pub enum ServerEvent {
    RoomCreated {
        room: RoomView,
        player: PlayerIdentity,
    },
    JoinAccepted {
        room: RoomView,
        player: PlayerIdentity,
    },
    JoinRejected {
        room_id: RoomId,
        reason: String,
    },
    PlayerJoined {
        player: PlayerIdentity,
    },
    /// Leave acknowledgment. The connection is unregistered once this is
    /// written.
    LeftRoom {
        room_id: RoomId,
        kicked: bool,
    },
    PlayerLeft {
        player_id: PlayerId,
        kicked: bool,
    },
    HostChanged {
        host_id: PlayerId,
    },
    TurnChanged {
        turn_id: PlayerId,
    },
    GameStarted {
        room: RoomView,
    },
    InitialHand {
        hand: Hand,
    },
    CardPlayed {
        player_id: PlayerId,
        card: Card,
        count: u32,
        is_clockwise: bool,
        next_turn_id: PlayerId,
    },
    PlayResult {
        success: bool,
        hand: Hand,
        message: String,
    },
    PlayerEliminated {
        player_id: PlayerId,
    },
    GameEnded {
        winner_id: PlayerId,
    },
    ChatMessage {
        player_id: PlayerId,
        name: String,
        message: String,
        sent_at: DateTime<Utc>,
    },
    Notification {
        message: String,
    },
    RequestFailed {
        request: String,
        reason: String,
    },
}

/// Where a unicast goes.
#[derive(Clone, Debug)]
pub enum Recipient {
    /// A registered connection, looked up in the registry at delivery time.
    Member { room_id: RoomId, conn: ConnId },
    /// A connection addressed by its queue, registered or not.
    Direct(Outbox),
}

/// Envelope accepted by the event switch
#[derive(Clone, Debug)]
pub enum OutboundEvent {
    Unicast {
        recipient: Recipient,
        payload: ServerEvent,
    },
    Broadcast {
        room_id: RoomId,
        /// Connection left out, usually one on its way out of the room.
        except: Option<ConnId>,
        payload: ServerEvent,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_play_card() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event_type":"play-card","hand_index":2,"is_add":false,"target_player_id":"p4"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::PlayCard {
                hand_index: 2,
                is_add: false,
                target_player_id: Some(PlayerId::from("p4")),
            }
        );
    }

    #[test]
    fn test_play_card_defaults() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event_type":"play-card","hand_index":0}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::PlayCard {
                hand_index: 0,
                is_add: true,
                target_player_id: None,
            }
        );
    }

    #[test]
    fn test_unit_events_ignore_extra_fields() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event_type":"leave-room","message":""}"#).unwrap();
        assert_eq!(event, ClientEvent::LeaveRoom);
        assert_eq!(event.event_type(), "leave-room");
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event_type":"fold"}"#).is_err());
    }

    #[test]
    fn test_server_event_tag() {
        let json = serde_json::to_value(ServerEvent::HostChanged {
            host_id: PlayerId::from("p2"),
        })
        .unwrap();
        assert_eq!(json["event_type"], "host-changed");
        assert_eq!(json["host_id"], "p2");
    }

    #[test]
    fn test_request_failed_keeps_its_tag() {
        let event = ServerEvent::RequestFailed {
            request: "chat".to_string(),
            reason: "message is empty".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "request-failed");
        assert_eq!(json["request"], "chat");

        let back: ServerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
