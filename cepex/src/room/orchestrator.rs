//! Session orchestrator: turns client events into game mutations and
//! outbound events.
//!
//! Every handler runs under the target room's async mutex for its whole
//! duration, including event submission, so a room's events reach the switch
//! in the order its state changed. The switch never takes a room lock.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use futures_util::{Stream, StreamExt};
use log::{debug, info, warn};
use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::{Mutex, mpsc};

use super::{
    config::RoomConfig,
    errors::{ReadError, Result, SessionError},
    messages::{ClientEvent, ConnId, Outbox, ServerEvent},
    registry::RoomRegistry,
    switch::{EventSwitch, SwitchHandle},
    writer::{ConnectionWriter, MessageSink, Unregister},
};
use crate::game::{
    GameError, GameRoom, Phase, Resolution, RoomView,
    entities::{Deck, Hand, PlayerId, PlayerIdentity, RoomId},
};

struct Room {
    game: GameRoom,
    /// Set at teardown. A handler that grabbed the room just before it was
    /// torn down treats it as gone.
    closed: bool,
}

/// The connection a request came in on.
struct Connection {
    room_id: RoomId,
    conn: ConnId,
    outbox: Outbox,
}

pub struct SessionOrchestrator {
    config: RoomConfig,
    registry: Arc<RoomRegistry>,
    rooms: DashMap<RoomId, Arc<Mutex<Room>>>,
    switch: SwitchHandle,
    next_conn: AtomicU64,
    deck_factory: fn() -> Deck,
}

impl SessionOrchestrator {
    /// Create an orchestrator and spawn its event switch. Must be called
    /// from within a Tokio runtime.
    pub fn new(config: RoomConfig) -> Arc<Self> {
        Self::with_deck_factory(config, Deck::shuffled)
    }

    /// Like [`SessionOrchestrator::new`], dealing every game from
    /// `deck_factory` instead of a shuffled deck.
    pub fn with_deck_factory(config: RoomConfig, deck_factory: fn() -> Deck) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let registry = Arc::new(RoomRegistry::new());
            let registrar: Weak<dyn Unregister> = me.clone();
            let (switch, handle) =
                EventSwitch::new(registry.clone(), config.switch_queue_capacity);
            tokio::spawn(switch.with_registrar(registrar).run());

            Self {
                config,
                registry,
                rooms: DashMap::new(),
                switch: handle,
                next_conn: AtomicU64::new(1),
                deck_factory,
            }
        })
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub async fn room_view(&self, room_id: &str) -> Option<RoomView> {
        let room = self.room(room_id)?;
        let room = room.lock().await;
        (!room.closed).then(|| room.game.view())
    }

    /// Drive one connection until its inbound stream ends.
    ///
    /// Spawns the connection's writer over `sink`, dispatches inbound events
    /// in order, and releases the connection afterwards, removing its player
    /// from the room if it is still seated.
    pub async fn serve_connection<I, S>(self: Arc<Self>, room_id: RoomId, mut inbound: I, sink: S)
    where
        I: Stream<Item = std::result::Result<ClientEvent, ReadError>> + Unpin + Send,
        S: MessageSink + 'static,
    {
        let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let (outbox, queue) = mpsc::channel(self.config.outbox_capacity);
        let registrar: Arc<dyn Unregister> = self.clone();
        let writer = ConnectionWriter::new(room_id.clone(), conn, sink, queue, registrar);
        let writer_task = tokio::spawn(writer.run());

        debug!("Room {room_id}: connection {conn} opened");
        let ctx = Connection {
            room_id,
            conn,
            outbox,
        };

        while let Some(item) = inbound.next().await {
            match item {
                Ok(event) => self.dispatch(&ctx, event).await,
                Err(ReadError::Malformed(reason)) => {
                    debug!("Room {}: malformed message on {}: {}", ctx.room_id, conn, reason);
                    self.reply(
                        &ctx,
                        ServerEvent::RequestFailed {
                            request: "unknown".to_string(),
                            reason: format!("malformed message: {reason}"),
                        },
                    )
                    .await;
                }
                Err(ReadError::ExpectedClose) => break,
                Err(e) => {
                    warn!("Room {}: connection {} lost: {}", ctx.room_id, conn, e);
                    if let Err(e) = self.leave_room(&ctx).await {
                        debug!("Room {}: implicit leave for {}: {}", ctx.room_id, conn, e);
                    }
                    break;
                }
            }
        }

        // Our sender must go before the writer can see its queue close.
        let room_id = ctx.room_id.clone();
        drop(ctx);
        self.release(&room_id, conn).await;
        if let Err(e) = writer_task.await {
            warn!("Room {room_id}: writer for connection {conn} panicked: {e}");
        }
        debug!("Room {room_id}: connection {conn} closed");
    }

    async fn dispatch(&self, ctx: &Connection, event: ClientEvent) {
        let event_type = event.event_type();
        debug!("Room {}: {} from connection {}", ctx.room_id, event_type, ctx.conn);

        let result = match event {
            ClientEvent::CreateRoom {
                client_name,
                avatar_url,
            } => self.create_room(ctx, &client_name, &avatar_url).await,
            ClientEvent::JoinRoom {
                client_name,
                avatar_url,
            } => self.join_room(ctx, &client_name, &avatar_url).await,
            ClientEvent::LeaveRoom => self.leave_room(ctx).await,
            ClientEvent::KickPlayer { player_id } => self.kick_player(ctx, &player_id).await,
            ClientEvent::StartGame => self.start_game(ctx).await,
            ClientEvent::PlayCard {
                hand_index,
                is_add,
                target_player_id,
            } => {
                self.play_card(ctx, hand_index, is_add, target_player_id.as_ref())
                    .await
            }
            ClientEvent::Chat { message } => self.chat(ctx, &message).await,
        };

        let Err(e) = result else { return };
        debug!("Room {}: {} failed: {}", ctx.room_id, event_type, e);

        let reason = e.client_message();
        let payload = match event_type {
            "join-room" => ServerEvent::JoinRejected {
                room_id: ctx.room_id.clone(),
                reason,
            },
            "play-card" => ServerEvent::PlayResult {
                success: false,
                hand: self.current_hand(ctx).await,
                message: reason,
            },
            _ => ServerEvent::RequestFailed {
                request: event_type.to_string(),
                reason,
            },
        };
        self.reply(ctx, payload).await;
    }

    async fn create_room(&self, ctx: &Connection, name: &str, avatar_url: &str) -> Result<()> {
        if self.is_seated(ctx).await {
            return Err(SessionError::AlreadyJoined);
        }
        if self.rooms.len() >= self.config.max_rooms {
            return Err(SessionError::ServerFull {
                max_rooms: self.config.max_rooms,
            });
        }

        let identity = PlayerIdentity::new(name, avatar_url);
        let mut game = GameRoom::new(ctx.room_id.clone(), self.config.game_settings());
        game.add_player(identity.clone())?;

        let room = Arc::new(Mutex::new(Room {
            game,
            closed: false,
        }));
        // Hold the lock until the creator is bound so joiners queue behind it.
        let guard = room.lock().await;

        match self.rooms.entry(ctx.room_id.clone()) {
            Entry::Occupied(_) => return Err(SessionError::AlreadyExists(ctx.room_id.clone())),
            Entry::Vacant(entry) => {
                entry.insert(room.clone());
            }
        }
        let registered = self.registry.create_room(&ctx.room_id).and_then(|()| {
            self.registry
                .bind(&ctx.room_id, ctx.conn, identity.id.clone(), ctx.outbox.clone())
        });
        if let Err(e) = registered {
            self.rooms.remove(&ctx.room_id);
            return Err(e);
        }

        info!("Room {} created by {} ({})", ctx.room_id, identity.name, identity.id);
        self.reply(
            ctx,
            ServerEvent::RoomCreated {
                room: guard.game.view(),
                player: identity,
            },
        )
        .await;
        Ok(())
    }

    async fn join_room(&self, ctx: &Connection, name: &str, avatar_url: &str) -> Result<()> {
        let room = self
            .room(&ctx.room_id)
            .ok_or_else(|| SessionError::RoomNotFound(ctx.room_id.clone()))?;
        let mut room = room.lock().await;
        if room.closed {
            return Err(SessionError::RoomNotFound(ctx.room_id.clone()));
        }
        // A binding whose player already left is replaced below.
        if let Ok(player_id) = self.registry.resolve_player(&ctx.room_id, ctx.conn)
            && room.game.contains(&player_id)
        {
            return Err(SessionError::AlreadyJoined);
        }

        let identity = PlayerIdentity::new(name, avatar_url);
        room.game.add_player(identity.clone())?;
        if let Err(e) = self.registry.bind(
            &ctx.room_id,
            ctx.conn,
            identity.id.clone(),
            ctx.outbox.clone(),
        ) {
            if let Err(rollback) = room.game.remove_player(&identity.id) {
                warn!(
                    "Room {}: rolling back join of {} failed: {}",
                    ctx.room_id, identity.id, rollback
                );
            }
            return Err(e);
        }

        info!("Room {}: {} joined ({})", ctx.room_id, identity.name, identity.id);
        self.reply(
            ctx,
            ServerEvent::JoinAccepted {
                room: room.game.view(),
                player: identity.clone(),
            },
        )
        .await;
        self.switch
            .broadcast(&ctx.room_id, ServerEvent::PlayerJoined { player: identity })
            .await;
        Ok(())
    }

    async fn leave_room(&self, ctx: &Connection) -> Result<()> {
        let player_id = self.registry.resolve_player(&ctx.room_id, ctx.conn)?;
        let room = self
            .room(&ctx.room_id)
            .ok_or_else(|| SessionError::RoomNotFound(ctx.room_id.clone()))?;
        let mut room = room.lock().await;

        // The writer unregisters this connection once the ack is written.
        self.switch
            .unicast(
                &ctx.room_id,
                ctx.conn,
                ServerEvent::LeftRoom {
                    room_id: ctx.room_id.clone(),
                    kicked: false,
                },
            )
            .await;
        info!("Room {}: {} left", ctx.room_id, player_id);
        self.evict(&mut room, &ctx.room_id, &player_id, false, Some(ctx.conn))
            .await;
        Ok(())
    }

    async fn kick_player(&self, ctx: &Connection, target: &PlayerId) -> Result<()> {
        let requester = self.registry.resolve_player(&ctx.room_id, ctx.conn)?;
        if &requester == target {
            return self.leave_room(ctx).await;
        }

        let room = self
            .room(&ctx.room_id)
            .ok_or_else(|| SessionError::RoomNotFound(ctx.room_id.clone()))?;
        let mut room = room.lock().await;
        if room.game.host_id() != Some(&requester) {
            return Err(GameError::NotHost.into());
        }
        if !room.game.contains(target) {
            return Err(GameError::NotFound(format!("player {target}")).into());
        }

        let target_conn = self.registry.connection_of(&ctx.room_id, target);
        if let Some(conn) = target_conn {
            self.switch
                .unicast(
                    &ctx.room_id,
                    conn,
                    ServerEvent::LeftRoom {
                        room_id: ctx.room_id.clone(),
                        kicked: true,
                    },
                )
                .await;
        }
        info!("Room {}: {} kicked {}", ctx.room_id, requester, target);
        self.evict(&mut room, &ctx.room_id, target, true, target_conn)
            .await;
        Ok(())
    }

    async fn start_game(&self, ctx: &Connection) -> Result<()> {
        let requester = self.registry.resolve_player(&ctx.room_id, ctx.conn)?;
        let room = self
            .room(&ctx.room_id)
            .ok_or_else(|| SessionError::RoomNotFound(ctx.room_id.clone()))?;
        let mut room = room.lock().await;

        let starter = room
            .game
            .start_game_with(&requester, (self.deck_factory)())?;
        info!(
            "Room {}: game started with {} players",
            ctx.room_id,
            room.game.len()
        );

        self.switch
            .broadcast(
                &ctx.room_id,
                ServerEvent::GameStarted {
                    room: room.game.view(),
                },
            )
            .await;
        for (conn, player_id) in self.registry.members(&ctx.room_id) {
            if let Some(hand) = room.game.hand(&player_id) {
                self.switch
                    .unicast(
                        &ctx.room_id,
                        conn,
                        ServerEvent::InitialHand { hand: hand.clone() },
                    )
                    .await;
            }
        }
        let name = room
            .game
            .player(&starter)
            .map(|p| p.identity.name.clone())
            .unwrap_or_default();
        self.switch
            .broadcast(
                &ctx.room_id,
                ServerEvent::Notification {
                    message: format!("{name} plays first"),
                },
            )
            .await;
        Ok(())
    }

    async fn play_card(
        &self,
        ctx: &Connection,
        hand_index: usize,
        is_add: bool,
        target: Option<&PlayerId>,
    ) -> Result<()> {
        let player_id = self.registry.resolve_player(&ctx.room_id, ctx.conn)?;
        let room = self
            .room(&ctx.room_id)
            .ok_or_else(|| SessionError::RoomNotFound(ctx.room_id.clone()))?;
        let mut room = room.lock().await;

        let outcome = room.game.play_card(&player_id, hand_index, is_add, target)?;

        self.switch
            .broadcast(
                &ctx.room_id,
                ServerEvent::CardPlayed {
                    player_id: player_id.clone(),
                    card: outcome.card,
                    count: room.game.count(),
                    is_clockwise: room.game.is_clockwise(),
                    next_turn_id: outcome.next_turn.clone(),
                },
            )
            .await;

        let message = match outcome.resolution {
            Resolution::Applied(_) => "card played".to_string(),
            Resolution::Discarded { attempted_count } => {
                format!("hand discarded: count would have reached {attempted_count}")
            }
        };
        self.reply(
            ctx,
            ServerEvent::PlayResult {
                success: outcome.is_success(),
                hand: room.game.hand(&player_id).cloned().unwrap_or_default(),
                message,
            },
        )
        .await;

        if outcome.eliminated {
            info!("Room {}: {} eliminated", ctx.room_id, player_id);
            self.switch
                .broadcast(
                    &ctx.room_id,
                    ServerEvent::PlayerEliminated {
                        player_id: player_id.clone(),
                    },
                )
                .await;
        }
        self.finish_if_won(&mut room, &ctx.room_id, None).await;
        Ok(())
    }

    async fn chat(&self, ctx: &Connection, message: &str) -> Result<()> {
        let player_id = self.registry.resolve_player(&ctx.room_id, ctx.conn)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let message: String = message.chars().take(self.config.max_chat_length).collect();

        let room = self
            .room(&ctx.room_id)
            .ok_or_else(|| SessionError::RoomNotFound(ctx.room_id.clone()))?;
        let room = room.lock().await;
        let name = room
            .game
            .player(&player_id)
            .map(|p| p.identity.name.clone())
            .ok_or_else(|| GameError::NotFound(format!("player {player_id}")))?;

        self.switch
            .broadcast(
                &ctx.room_id,
                ServerEvent::ChatMessage {
                    player_id,
                    name,
                    message,
                    sent_at: Utc::now(),
                },
            )
            .await;
        Ok(())
    }

    /// Remove a seated player and tell the room what changed. `departing` is
    /// the player's connection if it is still bound; it hears nothing past
    /// its `left-room`.
    async fn evict(
        &self,
        room: &mut Room,
        room_id: &str,
        player_id: &PlayerId,
        kicked: bool,
        departing: Option<ConnId>,
    ) {
        let removal = match room.game.remove_player(player_id) {
            Ok(removal) => removal,
            Err(e) => {
                debug!("Room {room_id}: nothing to evict for {player_id}: {e}");
                return;
            }
        };

        self.switch
            .broadcast_except(
                room_id,
                departing,
                ServerEvent::PlayerLeft {
                    player_id: player_id.clone(),
                    kicked,
                },
            )
            .await;
        if let Some(host_id) = removal.new_host {
            info!("Room {room_id}: host is now {host_id}");
            self.switch
                .broadcast_except(room_id, departing, ServerEvent::HostChanged { host_id })
                .await;
        }
        if let Some(turn_id) = removal.turn_passed_to {
            self.switch
                .broadcast_except(room_id, departing, ServerEvent::TurnChanged { turn_id })
                .await;
        }
        self.finish_if_won(room, room_id, departing).await;
    }

    async fn finish_if_won(&self, room: &mut Room, room_id: &str, departing: Option<ConnId>) {
        if room.game.phase() != Phase::InProgress {
            return;
        }
        if let Some(winner_id) = room.game.get_winner() {
            room.game.end_game();
            info!("Room {room_id}: {winner_id} wins");
            self.switch
                .broadcast_except(room_id, departing, ServerEvent::GameEnded { winner_id })
                .await;
        }
    }

    /// Unbind a connection, evicting its player if still seated, and tear
    /// the room down once nobody is left in it. Safe to call repeatedly.
    pub async fn release(&self, room_id: &str, conn: ConnId) {
        let Some(room) = self.room(room_id) else {
            self.registry.unbind(room_id, conn);
            return;
        };
        let mut room = room.lock().await;
        if room.closed {
            return;
        }

        if let Some(player_id) = self.registry.unbind(room_id, conn)
            && room.game.contains(&player_id)
        {
            info!("Room {room_id}: {player_id} disconnected");
            self.evict(&mut room, room_id, &player_id, false, None).await;
        }

        self.close_if_empty(&mut room, room_id);
    }

    /// Unbind a connection whose player has left the game. A connection that
    /// has joined again since keeps its new binding.
    async fn release_departed(&self, room_id: &str, conn: ConnId) {
        let Some(room) = self.room(room_id) else {
            self.registry.unbind(room_id, conn);
            return;
        };
        let mut room = room.lock().await;
        if room.closed {
            return;
        }
        if let Ok(player_id) = self.registry.resolve_player(room_id, conn)
            && room.game.contains(&player_id)
        {
            debug!("Room {room_id}: connection {conn} rejoined as {player_id}");
            return;
        }

        self.registry.unbind(room_id, conn);
        self.close_if_empty(&mut room, room_id);
    }

    /// Tear the room down once neither the game nor the registry holds
    /// anyone. Caller holds the room lock.
    fn close_if_empty(&self, room: &mut Room, room_id: &str) {
        if room.game.is_empty() && self.registry.is_empty(room_id) {
            room.closed = true;
            self.registry.remove_room(room_id);
            self.rooms.remove(room_id);
            info!("Room {room_id} closed");
        }
    }

    fn room(&self, room_id: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(room_id).map(|room| room.value().clone())
    }

    async fn current_hand(&self, ctx: &Connection) -> Hand {
        let Ok(player_id) = self.registry.resolve_player(&ctx.room_id, ctx.conn) else {
            return Hand::new();
        };
        let Some(room) = self.room(&ctx.room_id) else {
            return Hand::new();
        };
        let room = room.lock().await;
        room.game.hand(&player_id).cloned().unwrap_or_default()
    }

    /// Whether the connection is bound to a player still seated in its room.
    async fn is_seated(&self, ctx: &Connection) -> bool {
        let Ok(player_id) = self.registry.resolve_player(&ctx.room_id, ctx.conn) else {
            return false;
        };
        let Some(room) = self.room(&ctx.room_id) else {
            return false;
        };
        let room = room.lock().await;
        !room.closed && room.game.contains(&player_id)
    }

    /// Unicast to the requesting connection. Addressed by queue so the
    /// answer arrives even while the connection is being unbound.
    async fn reply(&self, ctx: &Connection, payload: ServerEvent) {
        self.switch.direct(ctx.outbox.clone(), payload).await;
    }
}

#[async_trait]
impl Unregister for SessionOrchestrator {
    async fn departed(&self, room_id: &str, conn: ConnId) {
        self.release_departed(room_id, conn).await;
    }

    async fn unregister(&self, room_id: &str, conn: ConnId) {
        self.release(room_id, conn).await;
    }
}
