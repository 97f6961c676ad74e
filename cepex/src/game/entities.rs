use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt};
use uuid::Uuid;

use super::constants;

/// Card pattern. Serialized as a lowercase string on the wire.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl Pattern {
    pub const ALL: [Pattern; 4] = [Self::Club, Self::Spade, Self::Diamond, Self::Heart];
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

/// Placeholder for card ranks (ace=1 ... king=13).
pub type Rank = u8;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub pattern: Pattern,
}

impl Card {
    pub const fn new(rank: Rank, pattern: Pattern) -> Self {
        Self { rank, pattern }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rank = match self.rank {
            1 => "A".to_string(),
            11 => "J".to_string(),
            12 => "Q".to_string(),
            13 => "K".to_string(),
            r => r.to_string(),
        };
        let repr = format!("{rank}/{}", self.pattern);
        write!(f, "{repr:>4}")
    }
}

/// Ordered cards held by a single player.
pub type Hand = Vec<Card>;

/// Draw pile. Cards are dealt from the front.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: VecDeque<Card>,
}

impl Deck {
    /// A fresh 52-card deck in a random order.
    pub fn shuffled() -> Self {
        let mut cards: Vec<Card> = Self::standard().cards.into();
        cards.shuffle(&mut rand::rng());
        Self {
            cards: cards.into(),
        }
    }

    /// A deck that deals exactly `cards`, front first. Useful for
    /// reproducible games.
    pub fn from_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        Self {
            cards: cards.into_iter().collect(),
        }
    }

    pub fn deal_card(&mut self) -> Option<Card> {
        self.cards.pop_front()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn standard() -> Self {
        let cards = (1..=constants::MAX_RANK)
            .flat_map(|rank| Pattern::ALL.into_iter().map(move |p| Card::new(rank, p)))
            .collect();
        Self { cards }
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::standard()
    }
}

/// Client-chosen room name, unique among live rooms.
pub type RoomId = String;

/// Opaque player identifier handed out on create/join.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Who a player is. Immutable once created.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerIdentity {
    pub id: PlayerId,
    pub name: String,
    pub avatar_url: String,
}

impl PlayerIdentity {
    /// New identity with a generated ID. Whitespace in the display name
    /// is collapsed and the name is truncated.
    pub fn new(name: &str, avatar_url: &str) -> Self {
        Self::with_id(PlayerId::generate(), name, avatar_url)
    }

    pub fn with_id(id: PlayerId, name: &str, avatar_url: &str) -> Self {
        let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut name: String = collapsed
            .chars()
            .take(constants::MAX_NAME_LENGTH)
            .collect::<String>()
            .trim_end()
            .to_string();
        if name.is_empty() {
            name = constants::DEFAULT_NAME.to_string();
        }
        Self {
            id,
            name,
            avatar_url: avatar_url.to_string(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlayerState {
    pub identity: PlayerIdentity,
    pub hand: Hand,
    alive: bool,
}

impl PlayerState {
    pub fn new(identity: PlayerIdentity) -> Self {
        Self {
            identity,
            hand: Vec::new(),
            alive: true,
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.identity.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// One-way: a dead player never comes back.
    pub fn eliminate(&mut self) {
        self.alive = false;
    }
}

/// What other players may see about a player. Hands stay private.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerView {
    pub player: PlayerIdentity,
    pub is_alive: bool,
    pub hand_size: usize,
}

impl From<&PlayerState> for PlayerView {
    fn from(value: &PlayerState) -> Self {
        Self {
            player: value.identity.clone(),
            is_alive: value.alive,
            hand_size: value.hand.len(),
        }
    }
}
