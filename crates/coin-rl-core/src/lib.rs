//! # coin-rl-core
//!
//! Core types for the coin game RL environment.
//!
//! This crate provides the foundational types shared by the bridge and the environment:
//! - Decoded game state
//! - Observation encoding and observation space
//! - Action table and action space
//! - Reward functions
//! - Configuration and error types

pub mod action;
pub mod config;
pub mod error;
pub mod observation;
pub mod reward;
pub mod state;

pub use action::{ACTION_COUNT, Action, ActionSpace, DEFAULT_ACTION_INDEX};
pub use config::{EnvConfig, TransportKind};
pub use error::{CoinRlError, DecodeError, Result};
pub use observation::{
    Observation, ObservationEncoder, ObservationSpace, SENTINEL, StepInfo,
};
pub use reward::{Reward, RewardFunction, ScoreDelta};
pub use state::{Coin, Enemy, GameState, PlayerState};
