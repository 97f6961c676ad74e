//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use cepex::RoomConfig;
use std::net::SocketAddr;

const DEFAULT_BIND: &str = "127.0.0.1:6969";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus exporter address; metrics are off when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Settings handed to the session core
    pub room: RoomConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if an address variable is set but does not parse
    pub fn from_env(bind_override: Option<SocketAddr>) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr("SERVER_BIND")?
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 6969))),
        };
        let metrics_bind = parse_addr("METRICS_BIND")?;

        let defaults = RoomConfig::default();
        let room = RoomConfig {
            capacity: parse_env_or("ROOM_CAPACITY", defaults.capacity),
            max_rooms: parse_env_or("MAX_ROOMS", defaults.max_rooms),
            hand_size: parse_env_or("HAND_SIZE", defaults.hand_size),
            count_limit: parse_env_or("COUNT_LIMIT", defaults.count_limit),
            switch_queue_capacity: parse_env_or(
                "SWITCH_QUEUE_CAPACITY",
                defaults.switch_queue_capacity,
            ),
            outbox_capacity: parse_env_or("OUTBOX_CAPACITY", defaults.outbox_capacity),
            max_chat_length: parse_env_or("MAX_CHAT_LENGTH", defaults.max_chat_length),
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            room,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.room
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                var: "room settings".to_string(),
                reason,
            })?;

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server address ({})", self.bind),
            });
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 6969)),
            metrics_bind: None,
            room: RoomConfig::default(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn parse_addr(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                var: key.to_string(),
                reason: format!("{value:?} is not an IP:PORT address ({e}), e.g. {DEFAULT_BIND}"),
            }),
        Err(_) => Ok(None),
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "SERVER_BIND".to_string(),
            reason: "bad".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SERVER_BIND"));
        assert!(msg.contains("bad"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_capacity_too_small() {
        let config = ServerConfig {
            room: RoomConfig {
                capacity: 1, // Invalid
                ..RoomConfig::default()
            },
            ..ServerConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_metrics_clash() {
        let config = ServerConfig {
            metrics_bind: Some("127.0.0.1:6969".parse().unwrap()),
            ..ServerConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("METRICS_BIND"));
    }

    #[test]
    fn test_parse_env_or_falls_back() {
        assert_eq!(parse_env_or("CEPEX_TEST_UNSET_VARIABLE", 42usize), 42);
    }

    #[test]
    fn test_bind_override_wins() {
        let addr: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        let config = ServerConfig::from_env(Some(addr)).unwrap();
        assert_eq!(config.bind, addr);
    }
}
