//! Prometheus metrics for monitoring server health.
//!
//! Metrics are exposed in Prometheus text format on a dedicated listener,
//! installed only when an exporter address is configured. Without an
//! exporter the recording functions are no-ops.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use cepex_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::websocket_connection_opened();
//! metrics::active_rooms(3);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Count a new WebSocket connection.
pub fn websocket_connection_opened() {
    metrics::counter!("websocket_connections_total").increment(1);
    metrics::gauge!("websocket_connections_active").increment(1.0);
}

pub fn websocket_connection_closed() {
    metrics::gauge!("websocket_connections_active").decrement(1.0);
}

/// Increment WebSocket messages sent counter.
pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

/// Increment WebSocket messages received counter.
pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

/// Increment malformed inbound message counter.
pub fn websocket_messages_malformed() {
    metrics::counter!("websocket_messages_malformed").increment(1);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Set current live room count.
pub fn active_rooms(count: usize) {
    metrics::gauge!("active_rooms").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        websocket_connection_opened();
        websocket_messages_received();
        websocket_messages_sent();
        websocket_messages_malformed();
        websocket_connection_closed();
        active_rooms(0);
    }
}
