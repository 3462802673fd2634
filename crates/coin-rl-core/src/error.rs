//! Error types for the coin RL environment

use std::time::Duration;
use thiserror::Error;

/// Result type for coin RL operations
pub type Result<T> = std::result::Result<T, CoinRlError>;

/// Why an incoming message could not be decoded
///
/// Decode failures are values, not faults: the bridge logs them and treats
/// the frame as a missed tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input is not well-formed JSON (or not a JSON object)
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// A recognized message is missing required fields or has non-numeric values
    #[error("Schema violation: {0}")]
    SchemaViolation(String),
}

/// Coin RL error types
#[derive(Debug, Error)]
pub enum CoinRlError {
    /// Message could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Action index outside the action table
    #[error("Action out of range: {0} (expected 0..=7)")]
    ActionOutOfRange(i64),

    /// No valid observation arrived before the deadline
    #[error("Timed out after {0:?} waiting for an observation")]
    Timeout(Duration),

    /// Connection lost or broken; recovery requires a reset
    #[error("Channel fault: {0}")]
    ChannelFault(String),

    /// Message that maps to no recognized schema
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Step called after the episode ended
    #[error("Episode terminated, call reset")]
    EpisodeTerminated,

    /// Step called before the first reset
    #[error("Environment not reset, call reset first")]
    NotReset,

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Async runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<serde_json::Error> for CoinRlError {
    fn from(err: serde_json::Error) -> Self {
        CoinRlError::Serialization(err.to_string())
    }
}

impl CoinRlError {
    /// Whether this error ends the current episode
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoinRlError::ChannelFault(_))
    }

    /// Stable machine-readable name for the error class
    pub fn kind(&self) -> &'static str {
        match self {
            CoinRlError::Decode(_) => "decode_error",
            CoinRlError::ActionOutOfRange(_) => "action_out_of_range",
            CoinRlError::Timeout(_) => "timeout",
            CoinRlError::ChannelFault(_) => "channel_fault",
            CoinRlError::ProtocolViolation(_) => "protocol_violation",
            CoinRlError::EpisodeTerminated => "episode_terminated",
            CoinRlError::NotReset => "not_reset",
            CoinRlError::Config(_) => "config",
            CoinRlError::Serialization(_) => "serialization",
            CoinRlError::Runtime(_) => "runtime",
        }
    }
}
