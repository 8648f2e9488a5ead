use bytes::Bytes;

use crate::error::Result;

/// Send half of a postable-message conduit.
///
/// Messages are opaque byte strings (serialized envelopes). Posting never
/// waits for the peer to process the message; delivery order between one
/// sender and one receiver is preserved by every implementation in this crate.
pub trait Conduit {
    /// Post one complete message to the peer.
    fn post(&mut self, message: &[u8]) -> Result<()>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

/// Receive half of a postable-message conduit.
pub trait Inbox {
    /// Wait up to the inbox poll interval for the next message.
    ///
    /// Returns `Ok(None)` when nothing arrived in time and
    /// `Err(TransportError::Closed)` once the peer is gone.
    fn next_message(&mut self) -> Result<Option<Bytes>>;
}

impl<C: Conduit + ?Sized> Conduit for Box<C> {
    fn post(&mut self, message: &[u8]) -> Result<()> {
        (**self).post(message)
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}

impl<I: Inbox + ?Sized> Inbox for Box<I> {
    fn next_message(&mut self) -> Result<Option<Bytes>> {
        (**self).next_message()
    }
}
