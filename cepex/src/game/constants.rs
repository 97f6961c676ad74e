//! Game-wide constants.

use super::entities::Rank;

/// Highest card rank (king).
pub const MAX_RANK: Rank = 13;

/// Cards in a full deck.
pub const DECK_SIZE: usize = 52;

/// Default room capacity.
pub const DEFAULT_CAPACITY: usize = 4;

/// Default number of cards dealt to each player.
pub const DEFAULT_HAND_SIZE: usize = 4;

/// Default ceiling for the running count.
pub const DEFAULT_COUNT_LIMIT: u32 = 100;

/// Display names are truncated to this many characters.
pub const MAX_NAME_LENGTH: usize = 32;

pub const DEFAULT_NAME: &str = "anonymous";
