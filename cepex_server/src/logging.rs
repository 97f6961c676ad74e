//! Structured logging configuration.
//!
//! The session core logs through the `log` facade; the subscriber installed
//! here picks those records up alongside the server's own `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var and default to
/// `info`.
///
/// # Example
///
/// ```no_run
/// use cepex_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,tower_http=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a finished WebSocket session with structured fields
pub fn log_session_closed(room_id: &str, duration_ms: u64, messages_received: u64) {
    if duration_ms < 1000 && messages_received == 0 {
        tracing::debug!(
            room_id = room_id,
            duration_ms = duration_ms,
            "WebSocket closed without traffic"
        );
    } else {
        tracing::info!(
            room_id = room_id,
            duration_ms = duration_ms,
            messages_received = messages_received,
            "WebSocket session closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_session_closed() {
        // Just ensure it doesn't panic
        log_session_closed("R1", 10, 0);
        log_session_closed("R1", 5000, 12);
    }
}
