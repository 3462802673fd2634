//! In-process game for tests
//!
//! Serves a scripted game over an in-memory duplex stream using the same
//! length-prefixed framing as the TCP transport.

use crate::framed::{FramedReader, FramedWriter};
use crate::protocol::{self, WireMessage};
use crate::transport::{AsyncReader, AsyncWriter, Channel, Connector};
use async_trait::async_trait;
use coin_rl_core::Result;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

const DUPLEX_BUFFER: usize = 64 * 1024;

/// One scripted reaction to a message from the bridge
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send a `gameState` record with this payload
    State(Value),
    /// Send these bytes as one frame, unmodified
    Raw(Vec<u8>),
    /// Pause before the next reply
    Delay(Duration),
    /// Drop the connection
    Hangup,
}

type Script = dyn Fn(&WireMessage) -> Vec<Reply> + Send + Sync;

/// Scripted game; every connection runs the same script
#[derive(Clone)]
pub struct MockGame {
    script: Arc<Script>,
    connects: Arc<AtomicUsize>,
}

impl MockGame {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&WireMessage) -> Vec<Reply> + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of connections opened so far
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockGame {
    async fn connect(&self) -> Result<Channel> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let (client, server) = tokio::io::duplex(DUPLEX_BUFFER);
        let (server_read, server_write) = tokio::io::split(server);
        tokio::spawn(serve(
            self.script.clone(),
            FramedReader(server_read),
            FramedWriter(server_write),
        ));

        let (client_read, client_write) = tokio::io::split(client);
        Ok(Channel::spawn(
            FramedReader(client_read),
            Box::new(FramedWriter(client_write)),
        ))
    }
}

async fn serve<R: AsyncReader, W: AsyncWriter>(script: Arc<Script>, mut reader: R, mut writer: W) {
    while let Ok(data) = reader.read_message().await {
        let msg = match protocol::decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                debug!("Mock game ignoring frame: {}", e);
                continue;
            }
        };

        for reply in script(&msg) {
            let frame = match reply {
                Reply::State(payload) => state_frame(payload),
                Reply::Raw(bytes) => bytes,
                Reply::Delay(pause) => {
                    tokio::time::sleep(pause).await;
                    continue;
                }
                Reply::Hangup => return,
            };
            if writer.write_message(&frame).await.is_err() {
                return;
            }
        }
    }
}

/// Encode a `gameState` record around `payload`
pub fn state_frame(payload: Value) -> Vec<u8> {
    json!({"type": "gameState", "payload": payload})
        .to_string()
        .into_bytes()
}

/// State payload with the player centred and nothing else on the field
pub fn player_state(score: f64, lives: f64) -> Value {
    json!({
        "player": {"x": 0.5, "y": 0.5, "dx": 0, "dy": 0, "score": score, "lives": lives},
        "enemies": [],
        "coins": []
    })
}
