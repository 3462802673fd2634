//! Blocking environment facade
//!
//! [`GameEnv`] owns a small tokio runtime so training code without an async
//! runtime can call `reset`/`step` directly. The runtime keeps one worker
//! thread running, so the reader task drains the connection between calls.

use crate::episode::{EpisodeController, StepOutcome};
use coin_bridge::{Connector, EndpointConnector};
use coin_rl_core::{
    ActionSpace, CoinRlError, EnvConfig, Observation, ObservationSpace, Result, StepInfo,
};
use tokio::runtime::{Builder, Runtime};

/// Gym-style environment with blocking calls
pub struct GameEnv<C: Connector = EndpointConnector> {
    // Dropped before the runtime so the channel shuts down inside it
    controller: EpisodeController<C>,
    runtime: Runtime,
}

impl GameEnv {
    /// Environment connected to the endpoint in `config`
    ///
    /// The connection is opened lazily by the first `reset`.
    pub fn new(config: EnvConfig) -> Result<Self> {
        Self::with_connector(EndpointConnector::new(config.clone()), &config)
    }
}

impl<C: Connector> GameEnv<C> {
    pub fn with_connector(connector: C, config: &EnvConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("coin-rl-env")
            .enable_all()
            .build()
            .map_err(|e| CoinRlError::Runtime(format!("Failed to start runtime: {}", e)))?;

        Ok(Self {
            controller: EpisodeController::new(connector, config)?,
            runtime,
        })
    }

    pub fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<serde_json::Value>,
    ) -> Result<(Observation, StepInfo)> {
        self.runtime.block_on(self.controller.reset(seed, options))
    }

    pub fn step(&mut self, action: i64) -> Result<StepOutcome> {
        self.runtime.block_on(self.controller.step(action))
    }

    pub fn observation_space(&self) -> ObservationSpace {
        self.controller.observation_space()
    }

    pub fn action_space(&self) -> ActionSpace {
        self.controller.action_space()
    }

    pub fn close(&mut self) {
        self.runtime.block_on(self.controller.close());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coin_bridge::WireMessage;
    use coin_bridge::mock::{MockGame, Reply, player_state};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn config() -> EnvConfig {
        EnvConfig {
            per_step_timeout_ms: 200,
            ..Default::default()
        }
    }

    fn counting_game() -> MockGame {
        let score = Arc::new(AtomicU64::new(0));
        MockGame::new(move |msg| {
            let s = match msg {
                WireMessage::Reset(_) => {
                    score.store(0, Ordering::SeqCst);
                    0
                }
                _ => score.fetch_add(1, Ordering::SeqCst) + 1,
            };
            vec![Reply::State(player_state(s as f64, 3.0))]
        })
    }

    #[test]
    fn test_blocking_episode() {
        let mut env = GameEnv::with_connector(counting_game(), &config()).unwrap();

        let (obs, _) = env.reset(Some(1), None).unwrap();
        assert_eq!(obs.score(), 0.0);
        assert_eq!(obs.to_vec().len(), env.observation_space().flat_len());

        for i in 1..=5 {
            let outcome = env.step(4).unwrap();
            assert_eq!(outcome.observation.score(), i as f64);
            assert_eq!(outcome.reward, 1.0);
            assert!(!outcome.info.stale);
        }

        env.close();
        assert!(matches!(env.step(4), Err(CoinRlError::NotReset)));
    }

    #[test]
    fn test_independent_instances() {
        let mut a = GameEnv::with_connector(counting_game(), &config()).unwrap();
        let mut b = GameEnv::with_connector(counting_game(), &config()).unwrap();
        a.reset(None, None).unwrap();
        b.reset(None, None).unwrap();

        a.step(0).unwrap();
        a.step(0).unwrap();
        let outcome = b.step(0).unwrap();

        assert_eq!(outcome.observation.score(), 1.0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = EnvConfig {
            per_step_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            GameEnv::new(config),
            Err(CoinRlError::Config(_))
        ));
    }
}
