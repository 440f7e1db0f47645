//! Server configuration.
//!
//! Values come from defaults, then an optional TOML file, then command-line flags
//! (applied by the binary), and are checked by [`ServerConfig::validate`] before the
//! server starts.

use crate::world::WorldConfig;
use serde::Deserialize;
use shared::{NetError, Result, TransportConfig};
use std::path::Path;
use std::time::Duration;

/// Upper bound on `max_players`; the id pool is sized up front.
pub const MAX_PLAYERS_LIMIT: u32 = 256;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_players: u32,
    /// World updates broadcast per second.
    pub tick_rate: u32,
    /// Connected peers that have not joined within this many seconds are dropped.
    pub join_timeout_secs: u64,
    /// Disconnect a peer that sends an undecodable packet instead of only dropping it.
    pub disconnect_on_malformed: bool,
    pub transport: TransportSettings,
    pub world: WorldConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_players: 8,
            tick_rate: 30,
            join_timeout_secs: 10,
            disconnect_on_malformed: true,
            transport: TransportSettings::default(),
            world: WorldConfig::default(),
        }
    }
}

/// The `[transport]` table. Durations are in milliseconds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportSettings {
    pub connection_timeout_ms: u64,
    pub ping_interval_ms: u64,
    pub min_resend_delay_ms: u64,
    pub max_resend_attempts: u32,
    pub simulated_loss: f32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        let defaults = TransportConfig::default();
        Self {
            connection_timeout_ms: defaults.connection_timeout.as_millis() as u64,
            ping_interval_ms: defaults.ping_interval.as_millis() as u64,
            min_resend_delay_ms: defaults.min_resend_delay.as_millis() as u64,
            max_resend_attempts: defaults.max_resend_attempts,
            simulated_loss: defaults.simulated_loss,
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NetError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| NetError::Config(format!("failed to parse TOML: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_players == 0 || self.max_players > MAX_PLAYERS_LIMIT {
            return Err(NetError::Config(format!(
                "max_players must be in 1..={}, got {}",
                MAX_PLAYERS_LIMIT, self.max_players
            )));
        }
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(NetError::Config(format!(
                "tick_rate must be in 1..=1000, got {}",
                self.tick_rate
            )));
        }
        if self.join_timeout_secs == 0 {
            return Err(NetError::Config("join_timeout_secs must be at least 1".to_string()));
        }
        self.world.validate().map_err(NetError::Config)?;
        self.transport_config().validate()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.tick_rate.max(1) as u64)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    pub fn transport_config(&self) -> TransportConfig {
        let settings = &self.transport;
        TransportConfig {
            connection_timeout: Duration::from_millis(settings.connection_timeout_ms),
            ping_interval: Duration::from_millis(settings.ping_interval_ms),
            min_resend_delay: Duration::from_millis(settings.min_resend_delay_ms),
            max_resend_attempts: settings.max_resend_attempts,
            simulated_loss: settings.simulated_loss,
            ..TransportConfig::default()
        }
    }
}
