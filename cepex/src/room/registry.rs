//! Room ID -> live connections.
//!
//! Each room keeps its members in bind order so broadcasts reach them in a
//! stable order. The map is sharded, so rooms never contend with each other;
//! all mutation of one room happens under that room's shard lock.

use dashmap::{DashMap, mapref::entry::Entry};
use log::debug;

use super::{
    errors::{Result, SessionError},
    messages::{ConnId, Outbox},
};
use crate::game::entities::{PlayerId, RoomId};

#[derive(Clone, Debug)]
pub struct Member {
    pub conn: ConnId,
    pub player_id: PlayerId,
    pub outbox: Outbox,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Vec<Member>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_room(&self, room_id: &str) -> Result<()> {
        match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(_) => Err(SessionError::AlreadyExists(room_id.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(Vec::new());
                debug!("Registry: room {room_id} created");
                Ok(())
            }
        }
    }

    /// Bind `conn` to `player_id` in `room_id`. Rebinding a connection
    /// replaces its entry in place.
    pub fn bind(&self, room_id: &str, conn: ConnId, player_id: PlayerId, outbox: Outbox) -> Result<()> {
        let mut members = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))?;

        match members.iter_mut().find(|m| m.conn == conn) {
            Some(member) => {
                member.player_id = player_id;
                member.outbox = outbox;
            }
            None => members.push(Member {
                conn,
                player_id,
                outbox,
            }),
        }
        Ok(())
    }

    /// Remove `conn` from `room_id`, returning the player it was bound to.
    /// Calling it again is harmless.
    pub fn unbind(&self, room_id: &str, conn: ConnId) -> Option<PlayerId> {
        let mut members = self.rooms.get_mut(room_id)?;
        let pos = members.iter().position(|m| m.conn == conn)?;
        let member = members.remove(pos);
        debug!("Registry: connection {conn} unbound from room {room_id}");
        Some(member.player_id)
    }

    pub fn resolve_player(&self, room_id: &str, conn: ConnId) -> Result<PlayerId> {
        self.rooms
            .get(room_id)
            .and_then(|members| {
                members
                    .iter()
                    .find(|m| m.conn == conn)
                    .map(|m| m.player_id.clone())
            })
            .ok_or_else(|| SessionError::NotRegistered {
                room_id: room_id.to_string(),
                conn,
            })
    }

    /// Connection/player pairs in bind order.
    pub fn members(&self, room_id: &str) -> Vec<(ConnId, PlayerId)> {
        self.rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .map(|m| (m.conn, m.player_id.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn connection_of(&self, room_id: &str, player_id: &PlayerId) -> Option<ConnId> {
        self.rooms
            .get(room_id)?
            .iter()
            .find(|m| &m.player_id == player_id)
            .map(|m| m.conn)
    }

    pub fn outbox(&self, room_id: &str, conn: ConnId) -> Option<Outbox> {
        self.rooms
            .get(room_id)?
            .iter()
            .find(|m| m.conn == conn)
            .map(|m| m.outbox.clone())
    }

    /// Every outbound queue in the room, in bind order.
    pub fn outboxes(&self, room_id: &str) -> Vec<(ConnId, Outbox)> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().map(|m| (m.conn, m.outbox.clone())).collect())
            .unwrap_or_default()
    }

    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// True when the room has no members or does not exist.
    pub fn is_empty(&self, room_id: &str) -> bool {
        self.rooms.get(room_id).is_none_or(|members| members.is_empty())
    }

    pub fn remove_room(&self, room_id: &str) -> bool {
        self.rooms.remove(room_id).is_some()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
