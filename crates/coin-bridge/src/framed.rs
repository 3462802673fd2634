//! Length-prefixed framing over any byte stream
//!
//! Frames are a 4-byte little-endian length followed by the JSON payload.
//! Used for games reached over plain TCP and for in-process streams.

use crate::transport::{AsyncReader, AsyncWriter, Channel};
use async_trait::async_trait;
use coin_rl_core::{CoinRlError, Result};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::info;

/// Largest frame accepted from the peer
pub const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Read half with length-prefixed framing
pub struct FramedReader<R>(pub R);

#[async_trait]
impl<R: AsyncRead + Unpin + Send> AsyncReader for FramedReader<R> {
    async fn read_message(&mut self) -> Result<Vec<u8>> {
        let mut len_bytes = [0u8; 4];
        self.0
            .read_exact(&mut len_bytes)
            .await
            .map_err(|e| CoinRlError::ChannelFault(format!("read length failed: {}", e)))?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > MAX_MESSAGE_LEN {
            return Err(CoinRlError::ChannelFault(format!(
                "Message too large: {} bytes",
                len
            )));
        }

        let mut data = vec![0u8; len];
        self.0
            .read_exact(&mut data)
            .await
            .map_err(|e| CoinRlError::ChannelFault(format!("read data failed: {}", e)))?;

        Ok(data)
    }
}

/// Write half with length-prefixed framing
pub struct FramedWriter<W>(pub W);

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> AsyncWriter for FramedWriter<W> {
    async fn write_message(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len())
            .map_err(|_| CoinRlError::Serialization(format!("frame of {} bytes", data.len())))?;
        self.0
            .write_all(&len.to_le_bytes())
            .await
            .map_err(|e| CoinRlError::ChannelFault(format!("write length failed: {}", e)))?;
        self.0
            .write_all(data)
            .await
            .map_err(|e| CoinRlError::ChannelFault(format!("write data failed: {}", e)))?;
        self.0
            .flush()
            .await
            .map_err(|e| CoinRlError::ChannelFault(format!("flush failed: {}", e)))?;

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.0
            .shutdown()
            .await
            .map_err(|e| CoinRlError::ChannelFault(format!("shutdown failed: {}", e)))
    }
}

/// Open a framed TCP channel to `addr`
pub async fn connect_tcp(addr: &str, timeout: Duration) -> Result<Channel> {
    info!("Connecting to game at tcp://{}", addr);

    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| CoinRlError::ChannelFault(format!("Connection timeout to {}", addr)))?
        .map_err(|e| CoinRlError::ChannelFault(format!("Failed to connect to {}: {}", addr, e)))?;

    // Disable Nagle's algorithm for low latency
    stream
        .set_nodelay(true)
        .map_err(|e| CoinRlError::ChannelFault(format!("Failed to set TCP_NODELAY: {}", e)))?;

    let (read_half, write_half) = stream.into_split();
    info!("Connected to game at tcp://{}", addr);
    Ok(Channel::spawn(
        FramedReader(read_half),
        Box::new(FramedWriter(write_half)),
    ))
}
