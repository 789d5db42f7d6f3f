//! Configuration module - environment variable parsing

use std::env;

use crate::util::time::{DEFAULT_FRAME_RATE, DEFAULT_SEND_RATE};

/// Client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// WebSocket URL of the game server
    pub server_url: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Character the local player joins with
    pub char_id: String,
    /// Simulation frames per second
    pub frame_rate: u32,
    /// Outbound state reports per second
    pub send_rate: u32,
    /// Seed for weapon spread/noise, random when unset
    pub rng_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_url =
            env::var("SERVER_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080/ws".to_string());
        if !(server_url.starts_with("ws://") || server_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(server_url));
        }

        Ok(Self {
            server_url,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            char_id: env::var("CHAR_ID").unwrap_or_else(|_| "default".to_string()),
            frame_rate: parse_rate("FRAME_RATE", DEFAULT_FRAME_RATE)?,
            send_rate: parse_rate("SEND_RATE", DEFAULT_SEND_RATE)?,
            rng_seed: match env::var("RNG_SEED") {
                Ok(raw) => Some(
                    raw.parse()
                        .map_err(|_| ConfigError::Invalid("RNG_SEED", raw))?,
                ),
                Err(_) => None,
            },
        })
    }
}

impl Config {
    /// Server URL with the character id appended as a query parameter
    pub fn connect_url(&self) -> String {
        let separator = if self.server_url.contains('?') { '&' } else { '?' };
        format!("{}{}charId={}", self.server_url, separator, self.char_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/ws".to_string(),
            log_level: "info".to_string(),
            char_id: "default".to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
            send_rate: DEFAULT_SEND_RATE,
            rng_seed: None,
        }
    }
}

fn parse_rate(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(rate) if (1..=1000).contains(&rate) => Ok(rate),
            _ => Err(ConfigError::Invalid(key, raw)),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    Invalid(&'static str, String),

    #[error("Server URL must use ws:// or wss://, got {0:?}")]
    InvalidUrl(String),
}
