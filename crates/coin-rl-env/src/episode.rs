//! Episode controller: reset/step semantics on top of the bridge

use coin_bridge::{Connector, SyncBridge};
use coin_rl_core::{
    Action, ActionSpace, CoinRlError, EnvConfig, Observation, ObservationSpace, Result,
    RewardFunction, ScoreDelta, StepInfo,
};
use serde::Serialize;
use tracing::{info, warn};

/// Result of one environment step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    /// Player ran out of lives
    pub terminated: bool,
    /// Episode cut short by a channel fault or the step cap
    pub truncated: bool,
    pub info: StepInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Running,
    Done,
}

/// Drives one episode at a time against a game
///
/// Calls must be serialized by the caller; `&mut self` enforces that within
/// one process.
pub struct EpisodeController<C: Connector, R = ScoreDelta> {
    bridge: SyncBridge<C>,
    reward_fn: R,
    max_episode_steps: Option<u64>,
    phase: Phase,
    prev: Option<Observation>,
    steps: u64,
    episode_reward: f64,
}

impl<C: Connector> EpisodeController<C> {
    /// Controller with score-delta reward
    pub fn new(connector: C, config: &EnvConfig) -> Result<Self> {
        Self::with_reward(connector, config, ScoreDelta)
    }
}

impl<C, R> EpisodeController<C, R>
where
    C: Connector,
    R: RewardFunction<State = Observation>,
{
    pub fn with_reward(connector: C, config: &EnvConfig, reward_fn: R) -> Result<Self> {
        Ok(Self {
            bridge: SyncBridge::new(connector, config)?,
            reward_fn,
            max_episode_steps: config.max_episode_steps,
            phase: Phase::NotStarted,
            prev: None,
            steps: 0,
            episode_reward: 0.0,
        })
    }

    /// Start a new episode
    pub async fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<serde_json::Value>,
    ) -> Result<(Observation, StepInfo)> {
        self.phase = Phase::NotStarted;
        self.prev = None;
        self.steps = 0;
        self.episode_reward = 0.0;

        let frame = self.bridge.reset(seed, options).await?;
        info!(
            "Episode started (seed={:?}, score={}, lives={})",
            seed,
            frame.observation.score(),
            frame.observation.lives()
        );

        self.phase = Phase::Running;
        self.prev = Some(frame.observation.clone());
        Ok((frame.observation, frame.info))
    }

    /// Apply action `index` and advance one step
    pub async fn step(&mut self, index: i64) -> Result<StepOutcome> {
        let action = Action::from_index(index)?;
        match self.phase {
            Phase::NotStarted => return Err(CoinRlError::NotReset),
            Phase::Done => return Err(CoinRlError::EpisodeTerminated),
            Phase::Running => {}
        }
        let prev = self.prev.take().ok_or(CoinRlError::NotReset)?;
        let step = self.steps + 1;

        let mut outcome = match self.bridge.step(action).await {
            Ok(frame) => {
                let reward = if frame.info.stale {
                    0.0
                } else {
                    self.reward_fn.compute(&prev, &frame.observation).value
                };
                let terminated = frame.observation.lives() <= 0.0;
                let truncated = !terminated
                    && self
                        .max_episode_steps
                        .is_some_and(|limit| step >= limit);
                StepOutcome {
                    observation: frame.observation,
                    reward,
                    terminated,
                    truncated,
                    info: frame.info,
                }
            }
            Err(e) if e.is_fatal() => {
                warn!("Truncating episode after {} steps: {}", step, e);
                let mut info = self.bridge.take_info();
                info.fault = Some(e.to_string());
                StepOutcome {
                    observation: prev,
                    reward: 0.0,
                    terminated: false,
                    truncated: true,
                    info,
                }
            }
            Err(e) => {
                self.prev = Some(prev);
                return Err(e);
            }
        };

        self.steps = step;
        self.episode_reward += outcome.reward;
        outcome.info.step = step;
        outcome.info.episode_reward = self.episode_reward;

        if outcome.terminated || outcome.truncated {
            self.phase = Phase::Done;
            info!(
                "Episode finished after {} steps (reward={}, terminated={}, truncated={})",
                self.steps, self.episode_reward, outcome.terminated, outcome.truncated
            );
        }
        self.prev = Some(outcome.observation.clone());
        Ok(outcome)
    }

    pub fn observation_space(&self) -> ObservationSpace {
        self.bridge.encoder().space()
    }

    pub fn action_space(&self) -> ActionSpace {
        ActionSpace::table()
    }

    /// Steps taken in the current episode
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn bridge(&self) -> &SyncBridge<C> {
        &self.bridge
    }

    /// Close the connection; the next reset reconnects
    pub async fn close(&mut self) {
        self.bridge.close().await;
        self.phase = Phase::NotStarted;
        self.prev = None;
    }
}
