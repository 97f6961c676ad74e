//! Real-time session layer.
//!
//! Each live connection has a bounded outbound queue drained by its own
//! [`ConnectionWriter`]. Handlers in the [`SessionOrchestrator`] never write
//! to a queue directly: every outbound event goes through the single
//! [`EventSwitch`], which resolves recipients through the [`RoomRegistry`]
//! and forwards events in submission order.
//!
//! ## Example
//!
//! ```no_run
//! use cepex::room::{ChannelSink, ClientEvent, RoomConfig, SessionOrchestrator};
//! use futures_util::stream;
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = SessionOrchestrator::new(RoomConfig::default());
//!     let (sink, mut events) = ChannelSink::new();
//!     let inbound = stream::iter(vec![Ok(ClientEvent::CreateRoom {
//!         client_name: "alice".to_string(),
//!         avatar_url: String::new(),
//!     })]);
//!
//!     tokio::spawn(orchestrator.serve_connection("lobby".to_string(), inbound, sink));
//!     println!("{:?}", events.recv().await);
//! }
//! ```

pub mod config;
pub mod errors;
pub mod messages;
pub mod orchestrator;
pub mod registry;
pub mod switch;
pub mod writer;

pub use config::RoomConfig;
pub use errors::{ReadError, SessionError, TransportError};
pub use messages::{ClientEvent, ConnId, OutboundEvent, Outbox, Recipient, ServerEvent};
pub use orchestrator::SessionOrchestrator;
pub use registry::RoomRegistry;
pub use switch::{EventSwitch, SwitchHandle};
pub use writer::{ChannelSink, ConnectionWriter, MessageSink, Unregister};
