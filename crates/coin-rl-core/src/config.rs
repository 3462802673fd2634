//! Environment configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::action::{ACTION_COUNT, DEFAULT_ACTION_INDEX};
use crate::error::{CoinRlError, Result};
use crate::observation::{MAX_COINS, MAX_ENEMIES};

/// Game simulation rate the default step timeout is derived from
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Wire transport used to reach the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// WebSocket text frames carrying JSON
    #[default]
    WebSocket,
    /// 4-byte little-endian length prefix + JSON
    Tcp,
}

impl std::str::FromStr for TransportKind {
    type Err = CoinRlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            "tcp" => Ok(TransportKind::Tcp),
            other => Err(CoinRlError::Config(format!("unknown transport: {}", other))),
        }
    }
}

/// Configuration for one environment instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Game host (default: 127.0.0.1)
    pub host: String,
    /// Game port (default: 6789)
    pub port: u16,
    /// Full endpoint URL; overrides host/port for WebSocket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Wire transport
    pub transport: TransportKind,
    /// Deadline for each observation after an action or reset
    pub per_step_timeout_ms: u64,
    /// Deadline for establishing the connection
    pub connect_timeout_ms: u64,
    /// Enemy slots in the observation
    pub max_enemies: usize,
    /// Coin slots in the observation
    pub max_coins: usize,
    /// Action sent when a step deadline is missed
    pub default_action: usize,
    /// Consecutive unrecognized messages tolerated before the channel is faulted;
    /// any valid game state resets the count
    pub max_protocol_violations: u32,
    /// Steps after which an episode is truncated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_episode_steps: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6789,
            url: None,
            transport: TransportKind::WebSocket,
            // One tick, rounded up
            per_step_timeout_ms: 1000_u64.div_ceil(DEFAULT_TICK_RATE as u64),
            connect_timeout_ms: 5000,
            max_enemies: MAX_ENEMIES,
            max_coins: MAX_COINS,
            default_action: DEFAULT_ACTION_INDEX,
            max_protocol_violations: 16,
            max_episode_steps: None,
        }
    }
}

impl EnvConfig {
    /// Load from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoinRlError::Config(format!("reading {}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply `COIN_RL_*` environment variable overrides
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(host) = env_var("COIN_RL_HOST") {
            self.host = host;
        }
        if let Some(port) = env_var("COIN_RL_PORT") {
            self.port = parse_var("COIN_RL_PORT", &port)?;
        }
        if let Some(url) = env_var("COIN_RL_URL") {
            self.url = Some(url);
        }
        if let Some(transport) = env_var("COIN_RL_TRANSPORT") {
            self.transport = transport.parse()?;
        }
        if let Some(ms) = env_var("COIN_RL_STEP_TIMEOUT_MS") {
            self.per_step_timeout_ms = parse_var("COIN_RL_STEP_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = env_var("COIN_RL_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = parse_var("COIN_RL_CONNECT_TIMEOUT_MS", &ms)?;
        }
        Ok(self)
    }

    /// Reject settings the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.per_step_timeout_ms == 0 {
            return Err(CoinRlError::Config("per_step_timeout_ms must be > 0".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(CoinRlError::Config("connect_timeout_ms must be > 0".into()));
        }
        if self.max_enemies == 0 || self.max_coins == 0 {
            return Err(CoinRlError::Config(
                "max_enemies and max_coins must be > 0".into(),
            ));
        }
        if self.default_action >= ACTION_COUNT {
            return Err(CoinRlError::Config(format!(
                "default_action {} outside 0..{}",
                self.default_action, ACTION_COUNT
            )));
        }
        Ok(())
    }

    pub fn per_step_timeout(&self) -> Duration {
        Duration::from_millis(self.per_step_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// URL for WebSocket, `host:port` for TCP
    pub fn endpoint(&self) -> String {
        match (self.transport, &self.url) {
            (TransportKind::WebSocket, Some(url)) => url.clone(),
            (TransportKind::WebSocket, None) => format!("ws://{}:{}", self.host, self.port),
            (TransportKind::Tcp, _) => format!("{}:{}", self.host, self.port),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CoinRlError::Config(format!("{}: invalid value {:?}", key, value)))
}
