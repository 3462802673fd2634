//! Transport abstractions for the game connection
//!
//! Provides AsyncReader/AsyncWriter traits that can be implemented
//! for different transport mechanisms (WebSocket, length-prefixed TCP, in-memory).

use crate::protocol::{WireMessage, decode};
use async_trait::async_trait;
use coin_rl_core::{CoinRlError, DecodeError, EnvConfig, GameState, Result, TransportKind};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Frames buffered between the reader task and the bridge before the oldest are dropped
pub const FEED_CAPACITY: usize = 64;

/// Trait for async reading from a transport
#[async_trait]
pub trait AsyncReader: Send {
    /// Read one complete message; an error means the connection is gone
    async fn read_message(&mut self) -> Result<Vec<u8>>;
}

/// Trait for async writing to a transport
#[async_trait]
pub trait AsyncWriter: Send {
    /// Write one complete message
    async fn write_message(&mut self, data: &[u8]) -> Result<()>;

    /// Close the write side gracefully
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Decoded event published by the reader task
#[derive(Debug, Clone)]
pub enum Inbound {
    /// Valid game state snapshot
    State(GameState),
    /// Frame that failed to decode
    Invalid(DecodeError),
    /// Frame with a type the bridge does not consume
    Unexpected(String),
    /// Connection ended; always the last event
    Closed(String),
}

/// Background reader task that decodes incoming frames
///
/// Every frame becomes exactly one [`Inbound`] event on `feed`, in arrival order.
/// Policy (staleness, violation thresholds) is left to the consumer.
pub async fn reader_task<R: AsyncReader>(mut reader: R, feed: broadcast::Sender<Inbound>) {
    loop {
        match reader.read_message().await {
            Ok(data) => {
                let json_preview: String = String::from_utf8_lossy(&data).chars().take(200).collect();
                debug!("[Game→Rust] len={} json={}", data.len(), json_preview);

                let event = match decode(&data) {
                    Ok(WireMessage::GameState(state)) => Inbound::State(state),
                    Ok(other) => Inbound::Unexpected(other.kind().to_string()),
                    Err(e) => Inbound::Invalid(e),
                };

                if feed.send(event).is_err() {
                    debug!("Feed has no subscribers, reader task exiting");
                    break;
                }
            }
            Err(e) => {
                error!("Reader task failed: {}", e);
                let reason = match e {
                    CoinRlError::ChannelFault(reason) => reason,
                    other => other.to_string(),
                };
                let _ = feed.send(Inbound::Closed(reason));
                break;
            }
        }
    }
}

/// One live bidirectional connection to the game
///
/// Dropping the channel stops its reader task.
pub struct Channel {
    writer: Box<dyn AsyncWriter>,
    feed: broadcast::Receiver<Inbound>,
    reader: JoinHandle<()>,
}

impl Channel {
    /// Start the reader task for `reader` and pair it with `writer`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<R: AsyncReader + 'static>(reader: R, writer: Box<dyn AsyncWriter>) -> Self {
        let (feed_tx, feed) = broadcast::channel(FEED_CAPACITY);
        let reader = tokio::spawn(reader_task(reader, feed_tx));
        Self {
            writer,
            feed,
            reader,
        }
    }

    /// Transmit one message; returns once the transport accepted it
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_message(data).await
    }

    /// Wait for the next inbound event
    pub async fn recv(&mut self) -> std::result::Result<Inbound, RecvError> {
        self.feed.recv().await
    }

    /// Take the next inbound event if one is queued
    pub fn try_recv(&mut self) -> std::result::Result<Inbound, TryRecvError> {
        self.feed.try_recv()
    }

    /// Close the write side and stop reading
    pub async fn close(mut self) {
        if let Err(e) = self.writer.close().await {
            warn!("Error closing channel: {}", e);
        }
        self.reader.abort();
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Something that can open a [`Channel`] to the game
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Channel>;
}

/// Connector for the configured network endpoint
#[derive(Debug, Clone)]
pub struct EndpointConnector {
    config: EnvConfig,
}

impl EndpointConnector {
    pub fn new(config: EnvConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for EndpointConnector {
    async fn connect(&self) -> Result<Channel> {
        let endpoint = self.config.endpoint();
        let timeout = self.config.connect_timeout();
        match self.config.transport {
            TransportKind::WebSocket => crate::ws::connect(&endpoint, timeout).await,
            TransportKind::Tcp => crate::framed::connect_tcp(&endpoint, timeout).await,
        }
    }
}
