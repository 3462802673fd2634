//! Action table and action space

use serde::{Deserialize, Serialize};

use crate::error::{CoinRlError, Result};

/// Number of entries in the action table
pub const ACTION_COUNT: usize = 8;

/// Index of the neutral action sent when a step deadline is missed ("stop up")
pub const DEFAULT_ACTION_INDEX: usize = 3;

/// A discrete control, ordered as the game's action table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Left,
    StopLeft,
    Up,
    StopUp,
    Right,
    StopRight,
    Down,
    StopDown,
}

impl Action {
    /// All actions in table order
    pub const ALL: [Action; ACTION_COUNT] = [
        Action::Left,
        Action::StopLeft,
        Action::Up,
        Action::StopUp,
        Action::Right,
        Action::StopRight,
        Action::Down,
        Action::StopDown,
    ];

    /// Look up an action by table index
    pub fn from_index(index: i64) -> Result<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(CoinRlError::ActionOutOfRange(index))
    }

    /// Position in the action table
    pub fn index(self) -> usize {
        self as usize
    }

    /// Command name understood by the game
    pub fn command(self) -> &'static str {
        match self {
            Action::Left => "left",
            Action::StopLeft => "stop left",
            Action::Up => "up",
            Action::StopUp => "stop up",
            Action::Right => "right",
            Action::StopRight => "stop right",
            Action::Down => "down",
            Action::StopDown => "stop down",
        }
    }

    /// Reverse lookup from a command name
    pub fn from_command(command: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.command() == command)
    }
}

impl TryFrom<i64> for Action {
    type Error = CoinRlError;

    fn try_from(index: i64) -> Result<Self> {
        Self::from_index(index)
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::ALL[DEFAULT_ACTION_INDEX]
    }
}

/// Description of an action space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSpace {
    /// Discrete action space
    Discrete {
        /// Number of discrete actions
        n: usize,
        /// Command names in index order
        names: Vec<String>,
    },
}

impl ActionSpace {
    /// The game's eight-entry action table
    pub fn table() -> Self {
        ActionSpace::Discrete {
            n: ACTION_COUNT,
            names: Action::ALL.iter().map(|a| a.command().to_string()).collect(),
        }
    }

    /// Number of valid indices
    pub fn len(&self) -> usize {
        match self {
            ActionSpace::Discrete { n, .. } => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `index` names an action
    pub fn contains(&self, index: i64) -> bool {
        usize::try_from(index).is_ok_and(|i| i < self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_command_round_trip() {
        for i in 0..ACTION_COUNT as i64 {
            let action = Action::from_index(i).unwrap();
            let back = Action::from_command(action.command()).unwrap();
            assert_eq!(back.index() as i64, i);
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        for bad in [-1, 8, i64::MAX, i64::MIN] {
            match Action::try_from(bad) {
                Err(CoinRlError::ActionOutOfRange(i)) => assert_eq!(i, bad),
                other => panic!("Expected ActionOutOfRange for {}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_table_order() {
        assert_eq!(Action::from_index(2).unwrap().command(), "up");
        assert_eq!(Action::default(), Action::StopUp);
        assert_eq!(Action::default().index(), DEFAULT_ACTION_INDEX);
        assert_eq!(Action::from_command("jump"), None);
    }

    #[test]
    fn test_action_space_json() {
        let space = ActionSpace::table();
        assert!(space.contains(7));
        assert!(!space.contains(8));
        assert!(!space.contains(-1));

        let json = serde_json::to_value(&space).unwrap();
        assert_eq!(json["type"], "discrete");
        assert_eq!(json["n"], 8);
        assert_eq!(json["names"][5], "stop right");
    }
}
