//! # Cepex
//!
//! Real-time session core for cepex, a turn-based card game where players
//! take turns pushing a shared running count towards a limit. Whoever breaks
//! the limit or runs out of cards is out; the last player standing wins.
//!
//! ## Core Modules
//!
//! - [`game`]: cards, the card effect table and the per-room state machine
//! - [`room`]: connection registry, event switch, connection writers and the
//!   session orchestrator that ties them to the game
//!
//! ## Example
//!
//! ```
//! use cepex::{GameRoom, GameSettings, entities::PlayerIdentity};
//!
//! let mut room = GameRoom::new("lobby".to_string(), GameSettings::default());
//! let alice = PlayerIdentity::new("alice", "");
//! let bob = PlayerIdentity::new("bob", "");
//! room.add_player(alice.clone()).unwrap();
//! room.add_player(bob).unwrap();
//!
//! let first = room.start_game(&alice.id).unwrap();
//! assert_eq!(first, alice.id);
//! ```

/// Card game engine and room state machine.
pub mod game;
pub use game::{
    GameError, GameRoom, GameSettings, Phase, PlayOutcome, Resolution, RoomView,
    constants::{self, DEFAULT_CAPACITY, DEFAULT_COUNT_LIMIT},
    entities::{self, Card, Deck, Pattern, PlayerId, PlayerIdentity},
    rules::{self, CardEffect},
};

/// Connection routing and session orchestration.
pub mod room;
pub use room::{RoomConfig, SessionError, SessionOrchestrator};
