//! Room and session configuration.

use serde::{Deserialize, Serialize};

use crate::game::{
    GameSettings,
    constants::{DECK_SIZE, DEFAULT_CAPACITY, DEFAULT_COUNT_LIMIT, DEFAULT_HAND_SIZE},
};

/// Settings shared by every room the orchestrator hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum players per room (default: 4)
    pub capacity: usize,

    /// Maximum number of live rooms on this server (default: 100)
    pub max_rooms: usize,

    /// Cards dealt to each player at start (default: 4)
    pub hand_size: usize,

    /// Highest legal running count (default: 100)
    pub count_limit: u32,

    /// Bound of the event switch queue
    pub switch_queue_capacity: usize,

    /// Bound of each connection's outbound queue
    pub outbox_capacity: usize,

    /// Chat messages are cut to this many characters
    pub max_chat_length: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_rooms: 100,
            hand_size: DEFAULT_HAND_SIZE,
            count_limit: DEFAULT_COUNT_LIMIT,
            switch_queue_capacity: 256,
            outbox_capacity: 64,
            max_chat_length: 256,
        }
    }
}

impl RoomConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity < 2 || self.capacity > DECK_SIZE {
            return Err(format!("Room capacity must be between 2 and {DECK_SIZE}"));
        }

        if self.max_rooms == 0 {
            return Err("Max rooms must be at least 1".to_string());
        }

        if self.hand_size == 0 {
            return Err("Hand size must be at least 1".to_string());
        }

        if self.count_limit == 0 {
            return Err("Count limit must be at least 1".to_string());
        }

        if self.switch_queue_capacity == 0 || self.outbox_capacity == 0 {
            return Err("Queue capacities must be at least 1".to_string());
        }

        if self.max_chat_length == 0 {
            return Err("Max chat length must be at least 1".to_string());
        }

        Ok(())
    }

    /// Game settings for a new room
    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            capacity: self.capacity,
            hand_size: self.hand_size,
            count_limit: self.count_limit,
        }
    }
}
