//! Cepex game server.
//!
//! Hosts any number of game rooms in one process. Clients reach a room over
//! `GET /ws/{room_id}` and drive it with JSON events.

use std::net::SocketAddr;

use anyhow::Error;
use cepex::SessionOrchestrator;
use cepex_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging, metrics,
};
use pico_args::Arguments;
use tracing::{error, info};

const HELP: &str = "\
Run a cepex game server

USAGE:
  cepex_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  ROOM_CAPACITY            Players per room [default: 4]
  MAX_ROOMS                Rooms alive at once [default: 100]
  HAND_SIZE                Cards dealt per player [default: 4]
  COUNT_LIMIT              Highest legal count [default: 100]
  SWITCH_QUEUE_CAPACITY    Pending outbound events [default: 256]
  OUTBOX_CAPACITY          Pending events per connection [default: 64]
  MAX_CHAT_LENGTH          Chat message length cap [default: 256]
  METRICS_BIND             Prometheus exporter address (disabled when unset)
  RUST_LOG                 Log filter [default: info]
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;

    logging::init();

    let config = ServerConfig::from_env(bind)?;
    config.validate()?;
    info!("Starting cepex server at {}", config.bind);
    info!(
        "Rooms: capacity {}, max {}, hand size {}, count limit {}",
        config.room.capacity, config.room.max_rooms, config.room.hand_size, config.room.count_limit
    );

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(Error::msg)?;
        info!("Prometheus metrics exposed on {}", metrics_bind);
    }

    let state = AppState {
        orchestrator: SessionOrchestrator::new(config.room.clone()),
    };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
