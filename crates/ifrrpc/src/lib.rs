//! Two-peer JSON-RPC between a page and a hidden frame.
//!
//! ifrrpc lets two isolated contexts call each other's named methods over a
//! conduit that can only post opaque messages. Calls carry positional params;
//! a call that wants an answer gets a correlation id and exactly one reply
//! (or a timeout, or a cancellation).
//!
//! # Crate Structure
//!
//! - [`transport`]: conduits (in-memory pair, framed Unix sockets)
//! - [`channel`]: envelopes, method table, dispatcher, channel lifecycle
//! - [`page`]: page-side methods and collaborators (behind `page` feature)

/// Re-export transport types.
pub mod transport {
    pub use ifrrpc_transport::*;
}

/// Re-export channel types.
pub mod channel {
    pub use ifrrpc_channel::*;
}

/// Re-export page collaborators (requires `page` feature).
#[cfg(feature = "page")]
pub mod page {
    pub use ifrrpc_page::*;
}
