//! Configuration module - environment variable parsing

use std::env;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// WebSocket endpoint of the spatial-audio mixing service
    pub mixer_url: String,
    /// API credential presented at connect time
    pub api_key: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Game-server address advertised to the mixer
    pub advertised_addr: String,
    /// Game-server port advertised to the mixer
    pub advertised_port: u16,

    /// Permission flags/groups whose holders count as admins
    pub admin_flags: Vec<String>,

    /// Persist unverified participants under synthetic identities (the
    /// bundled simulation lobby relies on this)
    pub fake_participants: bool,
    /// Bot count for the simulation lobby
    pub sim_bots: usize,
    /// Deterministic seed for the simulation lobby
    pub sim_seed: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mixer_url: env::var("MIXER_URL")
                .unwrap_or_else(|_| "ws://127.0.0.1:9100".to_string()),

            api_key: env::var("MIXER_API_KEY").map_err(|_| ConfigError::Missing("MIXER_API_KEY"))?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            advertised_addr: env::var("GAME_SERVER_ADDR")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),

            advertised_port: env::var("GAME_SERVER_PORT")
                .unwrap_or_else(|_| "27015".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("GAME_SERVER_PORT"))?,

            admin_flags: env::var("ADMIN_FLAGS")
                .unwrap_or_else(|_| "admin,voice-config".to_string())
                .split(',')
                .map(|flag| flag.trim().to_string())
                .filter(|flag| !flag.is_empty())
                .collect(),

            fake_participants: env::var("FAKE_PARTICIPANTS")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),

            sim_bots: env::var("SIM_BOTS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("SIM_BOTS"))?,

            sim_seed: env::var("SIM_SEED")
                .unwrap_or_else(|_| "42".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("SIM_SEED"))?,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
