//! WebSocket transport
//!
//! The game's server speaks JSON over WebSocket text frames. Binary frames are
//! accepted too; control frames are skipped.

use crate::transport::{AsyncReader, AsyncWriter, Channel};
use async_trait::async_trait;
use coin_rl_core::{CoinRlError, Result};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info};

/// Read half of a WebSocket
pub struct WsReader<S>(pub S);

#[async_trait]
impl<S> AsyncReader for WsReader<S>
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin + Send,
{
    async fn read_message(&mut self) -> Result<Vec<u8>> {
        loop {
            match self.0.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Binary(bytes))) => return Ok(bytes),
                Some(Ok(Message::Close(frame))) => {
                    return Err(CoinRlError::ChannelFault(format!(
                        "WebSocket closed by peer: {:?}",
                        frame
                    )));
                }
                Some(Ok(other)) => {
                    debug!("Skipping WebSocket control frame: {:?}", other);
                }
                Some(Err(e)) => {
                    return Err(CoinRlError::ChannelFault(format!(
                        "WebSocket read failed: {}",
                        e
                    )));
                }
                None => return Err(CoinRlError::ChannelFault("WebSocket stream ended".into())),
            }
        }
    }
}

/// Write half of a WebSocket
pub struct WsWriter<K>(pub K);

#[async_trait]
impl<K> AsyncWriter for WsWriter<K>
where
    K: Sink<Message, Error = WsError> + Unpin + Send,
{
    async fn write_message(&mut self, data: &[u8]) -> Result<()> {
        let text = String::from_utf8(data.to_vec())
            .map_err(|e| CoinRlError::Serialization(format!("frame is not UTF-8: {}", e)))?;
        self.0
            .send(Message::Text(text))
            .await
            .map_err(|e| CoinRlError::ChannelFault(format!("WebSocket write failed: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        self.0
            .close()
            .await
            .map_err(|e| CoinRlError::ChannelFault(format!("WebSocket close failed: {}", e)))
    }
}

/// Open a WebSocket channel to `url`
pub async fn connect(url: &str, timeout: Duration) -> Result<Channel> {
    info!("Connecting to game at {}", url);

    let (stream, _) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| CoinRlError::ChannelFault(format!("Connection timeout to {}", url)))?
        .map_err(|e| CoinRlError::ChannelFault(format!("Failed to connect to {}: {}", url, e)))?;

    let (sink, source) = stream.split();
    info!("Connected to game at {}", url);
    Ok(Channel::spawn(WsReader(source), Box::new(WsWriter(sink))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{self, WireMessage};
    use crate::transport::Inbound;
    use coin_rl_core::Action;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Loopback game that answers every action with one state frame
    async fn spawn_game() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            let (mut writer, mut reader) = ws.split();
            while let Some(Ok(msg)) = reader.next().await {
                let Message::Text(text) = msg else { continue };
                let Ok(WireMessage::Action(action)) = protocol::decode(text.as_bytes()) else {
                    continue;
                };
                let reply = format!(
                    r#"{{"type":"gameState","player":{{"x":0.5,"y":0.4,"dx":0,"dy":-1,"score":0,"lives":3}},"last":"{}"}}"#,
                    action.action
                );
                if writer.send(Message::Text(reply)).await.is_err() {
                    break;
                }
            }
        });
        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_websocket_round_trip() {
        let url = spawn_game().await;
        let mut channel = connect(&url, Duration::from_secs(5)).await.unwrap();

        let up = protocol::encode(&WireMessage::Action(Action::Up.into())).unwrap();
        channel.send(&up).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), channel.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            Inbound::State(state) => assert_eq!(state.player.dy, -1.0),
            other => panic!("Expected State, got {:?}", other),
        }

        channel.close().await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let result = connect(&url, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(CoinRlError::ChannelFault(_))));
    }
}
