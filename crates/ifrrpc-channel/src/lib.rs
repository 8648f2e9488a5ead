//! Two-peer asynchronous JSON-RPC channel.
//!
//! Each side owns a [`Channel`] over a [`Conduit`](ifrrpc_transport::Conduit).
//! Calls are JSON envelopes with positional params. A call that wants an
//! answer carries a fresh correlation id; the peer replies with an envelope
//! whose `method` is that id. Replies and named methods live in separate
//! tables, so neither can shadow the other.
//!
//! Everything is single-threaded and event-driven. Malformed input, unknown
//! names and faulty handlers are dropped after a log line; nothing here
//! panics across the receive loop.

pub mod channel;
pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod methods;
pub mod outbox;
pub mod params;
pub mod registry;

pub use channel::{Channel, RunExit};
pub use config::ChannelConfig;
pub use correlation::{CorrelationId, IdGenerator, CORRELATION_ID_LEN};
pub use dispatch::{Dispatch, DispatchState, Dispatcher, DropReason};
pub use envelope::{Envelope, JSONRPC_VERSION};
pub use error::{ChannelError, EnvelopeError, HandlerError, RegistryError, Result};
pub use outbox::Outbox;
pub use params::Params;
pub use registry::{
    CallOutcome, Caller, Handler, HandlerResult, Invocation, MethodTable, PendingCall,
    PendingCalls, ReplyCallback,
};
