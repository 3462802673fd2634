//! Decoded game state snapshots

use serde::{Deserialize, Serialize};

/// Latest snapshot pushed by the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// The controlled player
    pub player: PlayerState,

    /// Live enemies, in the order the game sent them
    #[serde(default)]
    pub enemies: Vec<Enemy>,

    /// Live coins, in the order the game sent them
    #[serde(default)]
    pub coins: Vec<Coin>,
}

/// Player scalars
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub score: f64,
    pub lives: f64,
}

/// A moving enemy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
}

/// A collectible coin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub x: f64,
    pub y: f64,
}

impl PlayerState {
    /// Player scalars in observation order: x, y, dx, dy, score, lives
    pub fn to_array(&self) -> [f64; 6] {
        [self.x, self.y, self.dx, self.dy, self.score, self.lives]
    }
}

impl GameState {
    /// A state with only the player present
    pub fn with_player(player: PlayerState) -> Self {
        Self {
            player,
            enemies: Vec::new(),
            coins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entities_default_to_empty() {
        let json = r#"{"player":{"x":0.5,"y":0.5,"dx":0,"dy":0,"score":0,"lives":3}}"#;
        let state: GameState = serde_json::from_str(json).unwrap();

        assert!(state.enemies.is_empty());
        assert!(state.coins.is_empty());
        assert_eq!(state.player.to_array(), [0.5, 0.5, 0.0, 0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_extra_entity_fields_ignored() {
        // The game sends its full entity records (size, speed, color, ...)
        let json = r#"{
            "player": {"x":1,"y":2,"dx":0,"dy":0,"score":5,"lives":1,"name":"..."},
            "enemies": [{"x":0.1,"y":0.2,"dx":0.01,"dy":-0.01,"width":12,"speed":10}],
            "coins": [{"x":0.3,"y":0.4,"spawnTime":1700000000}]
        }"#;
        let state: GameState = serde_json::from_str(json).unwrap();

        assert_eq!(state.enemies.len(), 1);
        assert_eq!(state.enemies[0].dy, -0.01);
        assert_eq!(state.coins[0], Coin { x: 0.3, y: 0.4 });
    }
}
