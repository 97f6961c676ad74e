//! Per-room game state machine.
//!
//! A room moves `Lobby -> InProgress -> Ended`. Players sit in a stable
//! sequence; turn order is sequence order (wrapping, in the current
//! direction) and eliminated players stay in the sequence with their alive
//! flag cleared so turn scans stay simple.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::constants::{DEFAULT_CAPACITY, DEFAULT_COUNT_LIMIT, DEFAULT_HAND_SIZE};
use super::entities::{Card, Deck, Hand, PlayerId, PlayerIdentity, PlayerState, PlayerView, RoomId};
use super::rules::CardEffect;

/// Errors that can occur while driving a game room
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("room is full")]
    RoomFull,
    #[error("{0} not found")]
    NotFound(String),
    #[error("only the host can do that")]
    NotHost,
    #[error("please wait for your turn")]
    NotYourTurn,
    #[error("you are already dead")]
    PlayerDead,
    #[error("no card at index {index} (hand has {len})")]
    InvalidIndex { index: usize, len: usize },
    #[error("game is not started")]
    GameNotStarted,
    #[error("game already started")]
    GameAlreadyStarted,
    #[error("need 2+ players")]
    NotEnoughPlayers,
    #[error("rule violation: {0}")]
    RuleViolation(String),
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    InProgress,
    Ended,
}

/// Game configuration settings
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameSettings {
    pub capacity: usize,
    pub hand_size: usize,
    pub count_limit: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            hand_size: DEFAULT_HAND_SIZE,
            count_limit: DEFAULT_COUNT_LIMIT,
        }
    }
}

/// What happened when a player was taken out of the room.
#[derive(Debug)]
pub struct Removal {
    pub player: PlayerState,
    /// Set when the removed player was host and someone is left to inherit it.
    pub new_host: Option<PlayerId>,
    /// Set when the removed player held the turn and it moved on.
    pub turn_passed_to: Option<PlayerId>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// Card played and its effect applied.
    Applied(CardEffect),
    /// Play would have pushed the count to `attempted_count`; the whole hand
    /// went to the pile instead.
    Discarded { attempted_count: u32 },
}

#[derive(Clone, Debug)]
pub struct PlayOutcome {
    pub card: Card,
    pub resolution: Resolution,
    pub eliminated: bool,
    pub next_turn: PlayerId,
}

impl PlayOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.resolution, Resolution::Applied(_))
    }
}

/// Snapshot of a room safe to show to any member.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RoomView {
    pub room_id: RoomId,
    pub capacity: usize,
    pub host_id: Option<PlayerId>,
    pub phase: Phase,
    pub is_clockwise: bool,
    pub count: u32,
    pub count_limit: u32,
    pub turn_id: Option<PlayerId>,
    pub players: Vec<PlayerView>,
}

#[derive(Debug)]
pub struct GameRoom {
    id: RoomId,
    settings: GameSettings,
    host_id: Option<PlayerId>,
    phase: Phase,
    is_clockwise: bool,
    players: Vec<PlayerState>,
    /// Player ID -> position in `players`. Rebuilt on removal.
    index: HashMap<PlayerId, usize>,
    turn_id: Option<PlayerId>,
    deck: Deck,
    pile: Vec<Card>,
    count: u32,
}

impl GameRoom {
    pub fn new(id: RoomId, settings: GameSettings) -> Self {
        Self {
            id,
            settings,
            host_id: None,
            phase: Phase::Lobby,
            is_clockwise: true,
            players: Vec::new(),
            index: HashMap::new(),
            turn_id: None,
            deck: Deck::from_cards([]),
            pile: Vec::new(),
            count: 0,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn host_id(&self) -> Option<&PlayerId> {
        self.host_id.as_ref()
    }

    pub fn turn_id(&self) -> Option<&PlayerId> {
        self.turn_id.as_ref()
    }

    pub fn is_clockwise(&self) -> bool {
        self.is_clockwise
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<&PlayerState> {
        self.index.get(player_id).map(|&idx| &self.players[idx])
    }

    pub fn player_index(&self, player_id: &PlayerId) -> Option<usize> {
        self.index.get(player_id).copied()
    }

    pub fn hand(&self, player_id: &PlayerId) -> Option<&Hand> {
        self.player(player_id).map(|p| &p.hand)
    }

    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.index.contains_key(player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive()).count()
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    pub fn pile(&self) -> &[Card] {
        &self.pile
    }

    pub fn view(&self) -> RoomView {
        RoomView {
            room_id: self.id.clone(),
            capacity: self.settings.capacity,
            host_id: self.host_id.clone(),
            phase: self.phase,
            is_clockwise: self.is_clockwise,
            count: self.count,
            count_limit: self.settings.count_limit,
            turn_id: self.turn_id.clone(),
            players: self.players.iter().map(PlayerView::from).collect(),
        }
    }

    /// Seat a new player at the end of the sequence. The first player to
    /// sit down hosts the room.
    pub fn add_player(&mut self, identity: PlayerIdentity) -> Result<(), GameError> {
        if self.phase != Phase::Lobby {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.players.len() >= self.settings.capacity {
            return Err(GameError::RoomFull);
        }

        if self.host_id.is_none() {
            self.host_id = Some(identity.id.clone());
        }
        self.index.insert(identity.id.clone(), self.players.len());
        self.players.push(PlayerState::new(identity));
        Ok(())
    }

    /// Take a player out of the room in any phase, handing the turn and the
    /// host role on as needed.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> Result<Removal, GameError> {
        let idx = self
            .player_index(player_id)
            .ok_or_else(|| GameError::NotFound(format!("player {player_id}")))?;

        let held_turn = self.turn_id.as_ref() == Some(player_id);
        let successor = if held_turn && self.phase == Phase::InProgress {
            self.scan_alive(idx).map(|i| self.players[i].id().clone())
        } else {
            None
        };

        let player = self.players.remove(idx);
        self.reindex();

        if held_turn {
            self.turn_id = successor.clone();
        }

        let new_host = if self.host_id.as_ref() == Some(player_id) {
            self.host_id = self.players.first().map(|p| p.id().clone());
            self.host_id.clone()
        } else {
            None
        };

        debug!(
            "Room {}: removed {} (new host {:?}, turn to {:?})",
            self.id, player_id, new_host, successor
        );

        Ok(Removal {
            player,
            new_host,
            turn_passed_to: successor,
        })
    }

    /// Deal from a freshly shuffled deck and hand the first turn to the
    /// first player in the sequence.
    pub fn start_game(&mut self, requester: &PlayerId) -> Result<PlayerId, GameError> {
        self.start_game_with(requester, Deck::shuffled())
    }

    /// Same as [`GameRoom::start_game`] but deals from `deck` as given.
    pub fn start_game_with(
        &mut self,
        requester: &PlayerId,
        mut deck: Deck,
    ) -> Result<PlayerId, GameError> {
        if self.phase != Phase::Lobby {
            return Err(GameError::GameAlreadyStarted);
        }
        if !self.contains(requester) {
            return Err(GameError::NotFound(format!("player {requester}")));
        }
        if self.host_id.as_ref() != Some(requester) {
            return Err(GameError::NotHost);
        }
        if self.players.len() < 2 {
            return Err(GameError::NotEnoughPlayers);
        }

        // Every hand gets the same number of cards.
        let hand_size = self.settings.hand_size.min(deck.len() / self.players.len());
        for player in &mut self.players {
            player.hand.clear();
        }
        for _ in 0..hand_size {
            for player in &mut self.players {
                if let Some(card) = deck.deal_card() {
                    player.hand.push(card);
                }
            }
        }

        let starter = self.players[0].id().clone();
        self.deck = deck;
        self.pile.clear();
        self.count = 0;
        self.is_clockwise = true;
        self.turn_id = Some(starter.clone());
        self.phase = Phase::InProgress;

        debug!(
            "Room {}: game started with {} players, {} cards each",
            self.id,
            self.players.len(),
            hand_size
        );

        Ok(starter)
    }

    /// Play the card at `hand_index` for `player_id`.
    ///
    /// A play that breaks the count limit still succeeds as a call (the
    /// outcome reports [`Resolution::Discarded`]); errors are returned only
    /// for requests that change nothing.
    pub fn play_card(
        &mut self,
        player_id: &PlayerId,
        hand_index: usize,
        is_add: bool,
        target: Option<&PlayerId>,
    ) -> Result<PlayOutcome, GameError> {
        if self.phase != Phase::InProgress {
            return Err(GameError::GameNotStarted);
        }
        let idx = self
            .player_index(player_id)
            .ok_or_else(|| GameError::NotFound(format!("player {player_id}")))?;
        if self.turn_id.as_ref() != Some(player_id) {
            return Err(GameError::NotYourTurn);
        }
        if !self.players[idx].is_alive() {
            return Err(GameError::PlayerDead);
        }
        let len = self.players[idx].hand.len();
        if hand_index >= len {
            return Err(GameError::InvalidIndex {
                index: hand_index,
                len,
            });
        }

        let card = self.players[idx].hand[hand_index];
        let effect = CardEffect::of(card, is_add, target.is_some());
        let redirect_idx = match (effect, target) {
            (CardEffect::Redirect, Some(target)) => Some(
                self.player_index(target)
                    .filter(|&i| i != idx && self.players[i].is_alive())
                    .ok_or_else(|| GameError::NotFound(format!("target player {target}")))?,
            ),
            _ => None,
        };

        // Nothing has changed up to here.
        let player = &mut self.players[idx];
        player.hand.remove(hand_index);
        self.pile.push(card);

        let resolution = match effect.next_count(self.count, self.settings.count_limit) {
            Ok(next) => {
                self.count = next;
                if let Some(drawn) = self.deck.deal_card() {
                    player.hand.push(drawn);
                }
                Resolution::Applied(effect)
            }
            Err(attempted_count) => {
                self.pile.append(&mut player.hand);
                Resolution::Discarded { attempted_count }
            }
        };

        let eliminated = player.hand.is_empty();
        if eliminated {
            player.eliminate();
        }

        let next_idx = match resolution {
            Resolution::Applied(CardEffect::Reverse) => {
                self.is_clockwise = !self.is_clockwise;
                self.next_player(idx)
            }
            Resolution::Applied(CardEffect::Skip) => self.next_player(self.next_player(idx)),
            Resolution::Applied(CardEffect::Redirect) => redirect_idx.unwrap_or(idx),
            _ => self.next_player(idx),
        };
        let next_turn = self.players[next_idx].id().clone();
        self.turn_id = Some(next_turn.clone());

        debug!(
            "Room {}: {} played {} ({:?}), count {}, next {}",
            self.id, player_id, card, resolution, self.count, next_turn
        );

        Ok(PlayOutcome {
            card,
            resolution,
            eliminated,
            next_turn,
        })
    }

    /// The last player standing, if the game is down to one.
    pub fn get_winner(&self) -> Option<PlayerId> {
        if self.phase != Phase::InProgress {
            return None;
        }
        let mut alive = self.players.iter().filter(|p| p.is_alive());
        match (alive.next(), alive.next()) {
            (Some(winner), None) => Some(winner.id().clone()),
            _ => None,
        }
    }

    pub fn end_game(&mut self) {
        self.phase = Phase::Ended;
        self.turn_id = None;
    }

    /// Index of the next alive player after `current` in the direction of
    /// play. Only returns `current` when nobody else is alive.
    pub fn next_player(&self, current: usize) -> usize {
        self.scan_alive(current).unwrap_or(current)
    }

    fn scan_alive(&self, current: usize) -> Option<usize> {
        let n = self.players.len();
        (1..n)
            .map(|step| {
                if self.is_clockwise {
                    (current + step) % n
                } else {
                    (current + n - step) % n
                }
            })
            .find(|&i| self.players[i].is_alive())
    }

    fn reindex(&mut self) {
        self.index = self
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id().clone(), i))
            .collect();
    }
}
