//! JSON-lines environment server
//!
//! One request per line, one response per line:
//!
//! ```text
//! -> {"method":"reset","seed":7}
//! <- {"ok":true,"result":{"observation":{...},"info":{...}}}
//! -> {"method":"step","action":2}
//! <- {"ok":true,"result":{"observation":{...},"reward":10.0,"terminated":false,"truncated":false,"info":{...}}}
//! -> {"method":"step","action":9}
//! <- {"ok":false,"error":{"kind":"action_out_of_range","message":"..."}}
//! ```
//!
//! `spaces` returns both space descriptors; `close` drops the game connection.

use crate::episode::EpisodeController;
use coin_bridge::Connector;
use coin_rl_core::{CoinRlError, Observation, Result, RewardFunction};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Request line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    Reset {
        #[serde(default)]
        seed: Option<u64>,
        #[serde(default)]
        options: Option<Value>,
    },
    Step {
        action: i64,
    },
    Spaces,
    Close,
}

/// Response line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorBody {
                kind: kind.into(),
                message: message.into(),
            }),
        }
    }
}

impl From<CoinRlError> for Response {
    fn from(err: CoinRlError) -> Self {
        Response::error(err.kind(), err.to_string())
    }
}

/// Serve requests from `reader` until EOF, then close the environment
pub async fn run<C, R, I, O>(
    env: &mut EpisodeController<C, R>,
    reader: I,
    mut writer: O,
) -> Result<()>
where
    C: Connector,
    R: RewardFunction<State = Observation>,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    info!("Environment server ready");

    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| CoinRlError::ChannelFault(format!("Failed to read request: {}", e)))?;
        let Some(line) = line else {
            info!("Client disconnected (EOF)");
            break;
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!("Received: {}", trimmed);

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => handle_request(env, request).await,
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                Response::error("bad_request", e.to_string())
            }
        };

        let response_json = serde_json::to_string(&response)?;
        debug!("Sending: {}", response_json);
        write_line(&mut writer, &response_json).await?;
    }

    env.close().await;
    Ok(())
}

async fn handle_request<C, R>(env: &mut EpisodeController<C, R>, request: Request) -> Response
where
    C: Connector,
    R: RewardFunction<State = Observation>,
{
    let result = match request {
        Request::Reset { seed, options } => env
            .reset(seed, options)
            .await
            .map(|(observation, info)| json!({ "observation": observation, "info": info })),
        Request::Step { action } => env
            .step(action)
            .await
            .and_then(|outcome| serde_json::to_value(outcome).map_err(CoinRlError::from)),
        Request::Spaces => Ok(json!({
            "observation_space": env.observation_space(),
            "action_space": env.action_space(),
        })),
        Request::Close => {
            env.close().await;
            Ok(json!({}))
        }
    };

    match result {
        Ok(value) => Response::success(value),
        Err(e) => {
            warn!("Request failed: {}", e);
            e.into()
        }
    }
}

async fn write_line<O: AsyncWrite + Unpin>(writer: &mut O, line: &str) -> Result<()> {
    let io = |e: std::io::Error| CoinRlError::ChannelFault(format!("Failed to write response: {}", e));
    writer.write_all(line.as_bytes()).await.map_err(io)?;
    writer.write_all(b"\n").await.map_err(io)?;
    writer.flush().await.map_err(io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coin_bridge::WireMessage;
    use coin_bridge::mock::{MockGame, Reply, player_state};
    use coin_rl_core::EnvConfig;

    fn env() -> EpisodeController<MockGame> {
        let game = MockGame::new(|msg| match msg {
            WireMessage::Reset(_) => vec![Reply::State(player_state(0.0, 3.0))],
            _ => vec![Reply::State(player_state(10.0, 3.0))],
        });
        let config = EnvConfig {
            per_step_timeout_ms: 200,
            max_enemies: 1,
            max_coins: 1,
            ..Default::default()
        };
        EpisodeController::new(game, &config).unwrap()
    }

    async fn serve(input: &str) -> Vec<Value> {
        let mut env = env();
        let mut output = Vec::new();
        run(&mut env, input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_requests() {
        let reset: Request = serde_json::from_str(r#"{"method":"reset","seed":3}"#).unwrap();
        assert_eq!(
            reset,
            Request::Reset {
                seed: Some(3),
                options: None
            }
        );

        let step: Request = serde_json::from_str(r#"{"method":"step","action":5}"#).unwrap();
        assert_eq!(step, Request::Step { action: 5 });

        assert!(serde_json::from_str::<Request>(r#"{"method":"render"}"#).is_err());
    }

    #[tokio::test]
    async fn test_reset_and_step() {
        let responses = serve(
            "{\"method\":\"reset\",\"seed\":7}\n\
             {\"method\":\"step\",\"action\":2}\n",
        )
        .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["ok"], true);
        assert_eq!(
            responses[0]["result"]["observation"]["player"],
            json!([0.5, 0.5, 0.0, 0.0, 0.0, 3.0])
        );
        assert_eq!(responses[1]["result"]["reward"], 10.0);
        assert_eq!(responses[1]["result"]["terminated"], false);
        assert_eq!(responses[1]["result"]["info"]["step"], 1);
    }

    #[tokio::test]
    async fn test_errors_are_responses() {
        let responses = serve(
            "{\"method\":\"step\",\"action\":1}\n\
             not json\n\
             \n\
             {\"method\":\"reset\"}\n\
             {\"method\":\"step\",\"action\":9}\n",
        )
        .await;

        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0]["error"]["kind"], "not_reset");
        assert_eq!(responses[1]["error"]["kind"], "bad_request");
        assert_eq!(responses[2]["ok"], true);
        assert_eq!(responses[3]["ok"], false);
        assert_eq!(responses[3]["error"]["kind"], "action_out_of_range");
    }

    #[tokio::test]
    async fn test_spaces() {
        let responses = serve("{\"method\":\"spaces\"}\n").await;
        let result = &responses[0]["result"];

        assert_eq!(result["action_space"]["type"], "discrete");
        assert_eq!(result["action_space"]["n"], 8);
        assert_eq!(result["observation_space"]["enemies"]["shape"], json!([1, 4]));
        assert_eq!(result["observation_space"]["coins"]["shape"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_close_then_reset() {
        let responses = serve(
            "{\"method\":\"reset\"}\n\
             {\"method\":\"close\"}\n\
             {\"method\":\"step\",\"action\":2}\n\
             {\"method\":\"reset\"}\n",
        )
        .await;

        assert_eq!(responses[1]["ok"], true);
        assert_eq!(responses[2]["error"]["kind"], "not_reset");
        assert_eq!(responses[3]["ok"], true);
    }
}
