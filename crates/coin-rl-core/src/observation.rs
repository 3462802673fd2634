//! Observation encoding, observation space and step info

use serde::{Deserialize, Serialize};

use crate::state::GameState;

/// Coordinate value reserved for "no entity in this slot"
pub const SENTINEL: f32 = -1.0;

/// Default capacity of the enemy array
pub const MAX_ENEMIES: usize = 30;

/// Default capacity of the coin array
pub const MAX_COINS: usize = 30;

/// Number of player scalars
pub const PLAYER_FEATURES: usize = 6;

/// Fixed-shape numeric observation handed to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// x, y, dx, dy, score, lives
    pub player: [f32; PLAYER_FEATURES],
    /// x, y, dx, dy per slot; always `max_enemies` long
    pub enemies: Vec<[f32; 4]>,
    /// x, y per slot; always `max_coins` long
    pub coins: Vec<[f32; 2]>,
    /// Score at full precision, for rewards
    pub score: f64,
    /// Lives at full precision, for termination
    pub lives: f64,
}

impl Observation {
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn lives(&self) -> f64 {
        self.lives
    }

    /// Flatten into `player ++ enemies ++ coins`
    pub fn to_vec(&self) -> Vec<f32> {
        let mut out =
            Vec::with_capacity(PLAYER_FEATURES + self.enemies.len() * 4 + self.coins.len() * 2);
        out.extend_from_slice(&self.player);
        out.extend(self.enemies.iter().flatten());
        out.extend(self.coins.iter().flatten());
        out
    }
}

/// Maps decoded game state onto the fixed observation shape
///
/// Entities are copied in arrival order, truncated at capacity, and the rest
/// of each array is filled with [`SENTINEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationEncoder {
    max_enemies: usize,
    max_coins: usize,
}

impl ObservationEncoder {
    pub fn new(max_enemies: usize, max_coins: usize) -> Self {
        Self {
            max_enemies,
            max_coins,
        }
    }

    pub fn max_enemies(&self) -> usize {
        self.max_enemies
    }

    pub fn max_coins(&self) -> usize {
        self.max_coins
    }

    /// Encode a snapshot
    pub fn encode(&self, state: &GameState) -> Observation {
        let p = state.player.to_array().map(|v| v as f32);

        let mut enemies: Vec<[f32; 4]> = state
            .enemies
            .iter()
            .take(self.max_enemies)
            .map(|e| [e.x as f32, e.y as f32, e.dx as f32, e.dy as f32])
            .collect();
        enemies.resize(self.max_enemies, [SENTINEL; 4]);

        let mut coins: Vec<[f32; 2]> = state
            .coins
            .iter()
            .take(self.max_coins)
            .map(|c| [c.x as f32, c.y as f32])
            .collect();
        coins.resize(self.max_coins, [SENTINEL; 2]);

        Observation {
            player: p,
            enemies,
            coins,
            score: state.player.score,
            lives: state.player.lives,
        }
    }

    /// Observation with the given player vector and every entity slot empty
    pub fn empty(&self, player: [f32; PLAYER_FEATURES]) -> Observation {
        Observation {
            player,
            enemies: vec![[SENTINEL; 4]; self.max_enemies],
            coins: vec![[SENTINEL; 2]; self.max_coins],
            score: f64::from(player[4]),
            lives: f64::from(player[5]),
        }
    }

    /// Declared space for observations produced by this encoder
    pub fn space(&self) -> ObservationSpace {
        ObservationSpace {
            player: BoxSpace::unbounded(vec![PLAYER_FEATURES]),
            enemies: BoxSpace::new(vec![self.max_enemies, 4], -1.0, 1.0),
            coins: BoxSpace::new(vec![self.max_coins, 2], -1.0, 1.0),
        }
    }
}

impl Default for ObservationEncoder {
    fn default() -> Self {
        Self::new(MAX_ENEMIES, MAX_COINS)
    }
}

/// Box-shaped space with uniform bounds; `None` means unbounded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub shape: Vec<usize>,
    pub low: Option<f32>,
    pub high: Option<f32>,
}

impl BoxSpace {
    pub fn new(shape: Vec<usize>, low: f32, high: f32) -> Self {
        Self {
            shape,
            low: Some(low),
            high: Some(high),
        }
    }

    pub fn unbounded(shape: Vec<usize>) -> Self {
        Self {
            shape,
            low: None,
            high: None,
        }
    }

    /// Number of scalars in the box
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Dict space of the three observation components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSpace {
    pub player: BoxSpace,
    pub enemies: BoxSpace,
    pub coins: BoxSpace,
}

impl ObservationSpace {
    /// Length of [`Observation::to_vec`]
    pub fn flat_len(&self) -> usize {
        self.player.size() + self.enemies.size() + self.coins.size()
    }
}

/// Side information returned with every reset and step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Observation is the last good one, not a reply to this action
    pub stale: bool,
    /// Frames superseded by newer ones before being delivered
    pub dropped_frames: u64,
    /// Frames that failed to decode during this call
    pub decode_errors: u64,
    /// Unrecognized messages seen during this call
    pub protocol_violations: u64,
    /// The default action was transmitted after a missed deadline
    pub default_action_sent: bool,
    /// Channel fault that ended the episode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    /// Steps taken in this episode
    pub step: u64,
    /// Reward accumulated in this episode
    pub episode_reward: f64,
    /// Wall time spent in the call
    pub latency_ms: f64,
}
