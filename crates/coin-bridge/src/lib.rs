//! Bridge between the coin game and a step/reset RL loop
//!
//! This crate provides:
//! - Wire protocol for game state, reset and action messages
//! - Transport abstractions (AsyncReader/AsyncWriter traits)
//! - WebSocket and length-prefixed TCP transports
//! - Background reader task feeding decoded frames to the bridge
//! - [`SyncBridge`], which pairs each action with the next fresh game state

pub mod bridge;
pub mod framed;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod protocol;
pub mod transport;
pub mod ws;

pub use bridge::{Awaited, Frame, LinkState, SyncBridge};
pub use protocol::{ActionPayload, ResetPayload, WireMessage, decode, encode};
pub use transport::{
    AsyncReader, AsyncWriter, Channel, Connector, EndpointConnector, FEED_CAPACITY, Inbound,
    reader_task,
};
