//! Card game engine: cards, the effect table, and the per-room state machine.

pub mod constants;
pub mod entities;
pub mod rules;
pub mod state_machine;

pub use state_machine::{
    GameError, GameRoom, GameSettings, Phase, PlayOutcome, Removal, Resolution, RoomView,
};
