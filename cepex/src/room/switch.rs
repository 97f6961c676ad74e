//! Event switch: the single ordered path from handlers to connections.
//!
//! Producers push [`OutboundEvent`]s into one bounded queue and block when it
//! is full. The switch drains it in order and fans each event out to the
//! per-connection queues with `try_send`, so one slow connection can never
//! stall delivery to the rest.
//!
//! A `left-room` acknowledgment that cannot be queued still releases its
//! connection: the switch hands it to the [`Unregister`] hook instead of
//! leaving it bound to a room it no longer plays in.

use log::{debug, info, warn};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::{
    messages::{ConnId, OutboundEvent, Outbox, Recipient, ServerEvent},
    registry::RoomRegistry,
    writer::Unregister,
};

/// Switch handle for submitting events
#[derive(Clone, Debug)]
pub struct SwitchHandle {
    sender: mpsc::Sender<OutboundEvent>,
}

impl SwitchHandle {
    /// Submit an event, waiting for room in the switch queue.
    pub async fn submit(&self, event: OutboundEvent) {
        if self.sender.send(event).await.is_err() {
            debug!("Event switch stopped, dropping event");
        }
    }

    pub async fn unicast(&self, room_id: &str, conn: ConnId, payload: ServerEvent) {
        self.submit(OutboundEvent::Unicast {
            recipient: Recipient::Member {
                room_id: room_id.to_string(),
                conn,
            },
            payload,
        })
        .await;
    }

    /// Unicast straight to a connection's queue, bypassing the registry.
    pub async fn direct(&self, outbox: Outbox, payload: ServerEvent) {
        self.submit(OutboundEvent::Unicast {
            recipient: Recipient::Direct(outbox),
            payload,
        })
        .await;
    }

    pub async fn broadcast(&self, room_id: &str, payload: ServerEvent) {
        self.broadcast_except(room_id, None, payload).await;
    }

    /// Broadcast to everyone in the room but `except`.
    pub async fn broadcast_except(
        &self,
        room_id: &str,
        except: Option<ConnId>,
        payload: ServerEvent,
    ) {
        self.submit(OutboundEvent::Broadcast {
            room_id: room_id.to_string(),
            except,
            payload,
        })
        .await;
    }
}

pub struct EventSwitch {
    registry: Arc<RoomRegistry>,
    inbox: mpsc::Receiver<OutboundEvent>,
    registrar: Option<Weak<dyn Unregister>>,
}

impl EventSwitch {
    pub fn new(registry: Arc<RoomRegistry>, capacity: usize) -> (Self, SwitchHandle) {
        let (sender, inbox) = mpsc::channel(capacity);
        (
            Self {
                registry,
                inbox,
                registrar: None,
            },
            SwitchHandle { sender },
        )
    }

    /// Release connections whose `left-room` could not be queued through
    /// `registrar`.
    pub fn with_registrar(mut self, registrar: Weak<dyn Unregister>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        info!("Event switch starting");
        while let Some(event) = self.inbox.recv().await {
            self.route(event);
        }
        info!("Event switch stopped");
    }

    fn route(&self, event: OutboundEvent) {
        match event {
            OutboundEvent::Unicast {
                recipient: Recipient::Member { room_id, conn },
                payload,
            } => {
                let Some(outbox) = self.registry.outbox(&room_id, conn) else {
                    debug!("Room {room_id}: connection {conn} gone, dropping unicast");
                    return;
                };
                let is_leave = matches!(payload, ServerEvent::LeftRoom { .. });
                let target = format!("room {room_id} connection {conn}");
                if !deliver(&target, &outbox, payload) && is_leave {
                    self.release(room_id, conn);
                }
            }
            OutboundEvent::Unicast {
                recipient: Recipient::Direct(outbox),
                payload,
            } => {
                deliver("direct recipient", &outbox, payload);
            }
            OutboundEvent::Broadcast {
                room_id,
                except,
                payload,
            } => {
                for (conn, outbox) in self.registry.outboxes(&room_id) {
                    if except == Some(conn) {
                        continue;
                    }
                    deliver(
                        &format!("room {room_id} connection {conn}"),
                        &outbox,
                        payload.clone(),
                    );
                }
            }
        }
    }

    /// Runs on its own task: the hook takes the room lock, which a handler
    /// may hold while it waits on this switch.
    fn release(&self, room_id: String, conn: ConnId) {
        let Some(registrar) = self.registrar.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        debug!("Room {room_id}: left-room for connection {conn} undeliverable, releasing");
        tokio::spawn(async move {
            registrar.departed(&room_id, conn).await;
        });
    }
}

/// Returns whether the event was queued.
fn deliver(target: &str, outbox: &Outbox, payload: ServerEvent) -> bool {
    match outbox.try_send(payload) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Queue full for {target}, dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("{target} closed, dropping event");
            false
        }
    }
}
