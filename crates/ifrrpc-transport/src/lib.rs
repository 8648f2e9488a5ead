//! Postable-message conduits for ifrrpc.
//!
//! The RPC channel only needs two things from a transport: post one opaque
//! message to the peer, and receive the peer's messages in order. This crate
//! defines that boundary ([`Conduit`] and [`Inbox`]) and ships two
//! implementations:
//! - an in-process pair ([`memory::pair`]) for tests and embedding
//! - length-prefixed frames over Unix domain sockets ([`unix`])
//!
//! This is the lowest layer of ifrrpc. Everything else builds on top of it.

pub mod error;
pub mod frame;
pub mod memory;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod unix;

pub use bytes::Bytes;
pub use error::{Result, TransportError};
pub use frame::{FrameConfig, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD};
pub use memory::{MemoryConduit, MemoryEndpoint, MemoryInbox};
pub use stream::{StreamConduit, StreamInbox};
pub use traits::{Conduit, Inbox};

#[cfg(unix)]
pub use unix::{connect, UnixConduitListener};
