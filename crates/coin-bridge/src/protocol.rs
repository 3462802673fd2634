//! Wire protocol for Rust <-> game communication
//!
//! Messages are JSON records tagged by a `type` string. The game reads and
//! writes the fields inline beside the tag:
//! `{"type": "action", "action": "up"}`.
//!
//! Records nested under a `payload` key are accepted on decode as well.

use coin_rl_core::{Action, DecodeError, GameState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload of a reset command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResetPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

/// Payload of an action command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPayload {
    /// Command name, e.g. `"stop up"`
    pub action: String,
}

impl From<Action> for ActionPayload {
    fn from(action: Action) -> Self {
        Self {
            action: action.command().to_string(),
        }
    }
}

/// Messages exchanged with the game process
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    // === Game -> Rust ===
    /// Current game state snapshot
    GameState(GameState),

    // === Rust -> Game ===
    /// Restart the game
    Reset(ResetPayload),

    /// Apply a control
    Action(ActionPayload),

    /// Any other `type`; kept so callers can log and count it
    Unrecognized { kind: String },
}

impl WireMessage {
    /// The `type` tag on the wire
    pub fn kind(&self) -> &str {
        match self {
            WireMessage::GameState(_) => "gameState",
            WireMessage::Reset(_) => "reset",
            WireMessage::Action(_) => "action",
            WireMessage::Unrecognized { kind } => kind,
        }
    }
}

/// Tag plus payload fields flattened into one record
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(flatten)]
    payload: &'a T,
}

/// Serialize a message to JSON bytes
pub fn encode(msg: &WireMessage) -> Result<Vec<u8>, serde_json::Error> {
    let kind = msg.kind();
    match msg {
        WireMessage::GameState(state) => serde_json::to_vec(&Envelope { kind, payload: state }),
        WireMessage::Reset(reset) => serde_json::to_vec(&Envelope { kind, payload: reset }),
        WireMessage::Action(action) => serde_json::to_vec(&Envelope { kind, payload: action }),
        WireMessage::Unrecognized { .. } => serde_json::to_vec(&Envelope {
            kind,
            payload: &Map::new(),
        }),
    }
}

/// Deserialize and validate a message from JSON bytes
pub fn decode(bytes: &[u8]) -> Result<WireMessage, DecodeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    let mut record = match value {
        Value::Object(record) => record,
        other => {
            return Err(DecodeError::MalformedPayload(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            )));
        }
    };

    let kind = match record.remove("type") {
        Some(Value::String(kind)) => kind,
        Some(other) => {
            return Err(DecodeError::SchemaViolation(format!(
                "`type` must be a string, got {}",
                json_type(&other)
            )));
        }
        None => return Err(DecodeError::SchemaViolation("missing `type`".into())),
    };

    let payload = record
        .remove("payload")
        .unwrap_or(Value::Object(record));

    let parsed = match kind.as_str() {
        "gameState" => serde_json::from_value(payload).map(WireMessage::GameState),
        "reset" => serde_json::from_value(payload).map(WireMessage::Reset),
        "action" => serde_json::from_value(payload).map(WireMessage::Action),
        _ => return Ok(WireMessage::Unrecognized { kind: kind.clone() }),
    };
    parsed.map_err(|e| DecodeError::SchemaViolation(format!("{}: {}", kind, e)))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_state_from_game() {
        let json = br#"{"type":"gameState","payload":{"player":{"x":0.5,"y":0.5,"dx":0,"dy":0,"score":0,"lives":3},"enemies":[],"coins":[{"x":0.1,"y":0.2}]}}"#;

        match decode(json) {
            Ok(WireMessage::GameState(state)) => {
                assert_eq!(state.player.lives, 3.0);
                assert_eq!(state.coins.len(), 1);
            }
            other => panic!("Wrong message: {:?}", other),
        }
    }

    #[test]
    fn test_inline_payload() {
        let json = br#"{"type":"gameState","player":{"x":1,"y":2,"dx":0,"dy":0,"score":4,"lives":1},"paused":false}"#;

        match decode(json) {
            Ok(WireMessage::GameState(state)) => assert_eq!(state.player.score, 4.0),
            other => panic!("Wrong message: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payload() {
        let cases: [&[u8]; 4] = [b"reset game", b"{\"type\":", b"[1,2,3]", b""];
        for bad in cases {
            match decode(bad) {
                Err(DecodeError::MalformedPayload(_)) => {}
                other => panic!("Expected MalformedPayload for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_schema_violations() {
        let cases: [&[u8]; 4] = [
            // lives missing
            br#"{"type":"gameState","payload":{"player":{"x":0,"y":0,"dx":0,"dy":0,"score":0}}}"#,
            // score not numeric
            br#"{"type":"gameState","payload":{"player":{"x":0,"y":0,"dx":0,"dy":0,"score":"ten","lives":3}}}"#,
            // no player at all
            br#"{"type":"gameState","payload":{"enemies":[]}}"#,
            // no type tag
            br#"{"payload":{}}"#,
        ];
        for bad in cases {
            match decode(bad) {
                Err(DecodeError::SchemaViolation(_)) => {}
                other => panic!(
                    "Expected SchemaViolation for {}, got {:?}",
                    String::from_utf8_lossy(bad),
                    other
                ),
            }
        }
    }

    #[test]
    fn test_unknown_type_is_unrecognized() {
        match decode(br#"{"type":"gameStarted!"}"#) {
            Ok(WireMessage::Unrecognized { kind }) => assert_eq!(kind, "gameStarted!"),
            other => panic!("Wrong message: {:?}", other),
        }
    }

    #[test]
    fn test_action_format() {
        let msg = WireMessage::Action(Action::StopUp.into());
        let bytes = encode(&msg).unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json, serde_json::json!({"type": "action", "action": "stop up"}));
        assert_eq!(decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_every_command_readable_at_top_level() {
        for action in Action::ALL {
            let bytes = encode(&WireMessage::Action(action.into())).unwrap();
            let json: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["action"], action.command());
        }
    }

    #[test]
    fn test_reset_format() {
        let msg = WireMessage::Reset(ResetPayload {
            seed: Some(42),
            options: None,
        });
        let json: Value = serde_json::from_slice(&encode(&msg).unwrap()).unwrap();

        assert_eq!(json["type"], "reset");
        assert_eq!(json["seed"], 42);
        assert!(json.get("options").is_none());
        assert!(json.get("payload").is_none());
    }
}
