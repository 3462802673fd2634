//! # coin-rl-env
//!
//! Gym-style environment for the coin game.
//!
//! - [`EpisodeController`]: async reset/step with reward, termination and truncation
//! - [`GameEnv`]: blocking facade that owns its own runtime
//! - [`serve`]: JSON-lines server so external training code can drive an environment

pub mod env;
pub mod episode;
pub mod serve;

pub use env::GameEnv;
pub use episode::{EpisodeController, StepOutcome};
