//! HTTP/WebSocket API for the cepex server.
//!
//! # Endpoints Overview
//!
//! - `GET /health` - Server health status
//! - `GET /ws/{room_id}` - Establish a WebSocket connection scoped to a room
//!
//! Every game interaction happens over the WebSocket: clients send JSON
//! events tagged by `event_type` (`create-room`, `join-room`, `play-card`,
//! ...) and receive JSON events tagged the same way.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use cepex::{RoomConfig, SessionOrchestrator};
//! use cepex_server::api::{create_router, AppState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState {
//!     orchestrator: SessionOrchestrator::new(RoomConfig::default()),
//! };
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use cepex::SessionOrchestrator;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers and WebSocket connections.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
}

/// Create the API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws/{room_id}", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// # Example
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","version":"0.1.0","rooms":{"active_count":2,"max":100},"timestamp":"..."}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let room_count = state.orchestrator.room_count();

    let response = json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": {
            "active_count": room_count,
            "max": state.orchestrator.config().max_rooms,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (StatusCode::OK, Json(response))
}
