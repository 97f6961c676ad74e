//! WebSocket server shell around the cepex session core.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
