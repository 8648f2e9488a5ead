//! In-process conduit pair.
//!
//! Stands in for the browser `postMessage` conduit when both contexts live in
//! one process (tests, embedding). Each direction is an ordered queue.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::{Conduit, Inbox};

/// One side of an in-memory conduit pair.
#[derive(Debug)]
pub struct MemoryEndpoint {
    conduit: MemoryConduit,
    inbox: MemoryInbox,
}

/// Send half of a [`MemoryEndpoint`].
#[derive(Debug, Clone)]
pub struct MemoryConduit {
    tx: Sender<Bytes>,
}

/// Receive half of a [`MemoryEndpoint`].
#[derive(Debug)]
pub struct MemoryInbox {
    rx: Receiver<Bytes>,
    poll_interval: Duration,
}

/// Create two connected endpoints. Inboxes wait up to `poll_interval` per poll.
pub fn pair(poll_interval: Duration) -> (MemoryEndpoint, MemoryEndpoint) {
    let (left_tx, right_rx) = mpsc::channel();
    let (right_tx, left_rx) = mpsc::channel();

    let left = MemoryEndpoint {
        conduit: MemoryConduit { tx: left_tx },
        inbox: MemoryInbox {
            rx: left_rx,
            poll_interval,
        },
    };
    let right = MemoryEndpoint {
        conduit: MemoryConduit { tx: right_tx },
        inbox: MemoryInbox {
            rx: right_rx,
            poll_interval,
        },
    };
    (left, right)
}

impl MemoryEndpoint {
    /// Split into independently owned send and receive halves.
    pub fn split(self) -> (MemoryConduit, MemoryInbox) {
        (self.conduit, self.inbox)
    }
}

impl Conduit for MemoryConduit {
    fn post(&mut self, message: &[u8]) -> Result<()> {
        trace!(size = message.len(), "posting in-memory message");
        self.tx
            .send(Bytes::copy_from_slice(message))
            .map_err(|_| TransportError::Closed)
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

impl Inbox for MemoryInbox {
    fn next_message(&mut self) -> Result<Option<Bytes>> {
        match self.rx.recv_timeout(self.poll_interval) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

impl MemoryInbox {
    /// Take every message already queued without waiting.
    pub fn drain_ready(&mut self) -> Vec<Bytes> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_arrive_in_order() {
        let (left, right) = pair(Duration::from_millis(10));
        let (mut tx, _left_inbox) = left.split();
        let (_right_tx, mut rx) = right.split();

        tx.post(b"one").unwrap();
        tx.post(b"two").unwrap();

        assert_eq!(rx.next_message().unwrap().unwrap().as_ref(), b"one");
        assert_eq!(rx.next_message().unwrap().unwrap().as_ref(), b"two");
        assert!(rx.next_message().unwrap().is_none());
    }

    #[test]
    fn dropped_peer_reports_closed() {
        let (left, right) = pair(Duration::ZERO);
        let (mut tx, mut left_inbox) = left.split();
        drop(right);

        assert!(matches!(tx.post(b"hello"), Err(TransportError::Closed)));
        assert!(matches!(
            left_inbox.next_message(),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn drain_ready_does_not_block() {
        let (left, right) = pair(Duration::from_secs(60));
        let (mut tx, _) = left.split();
        let (_, mut rx) = right.split();

        assert!(rx.drain_ready().is_empty());
        tx.post(b"a").unwrap();
        tx.post(b"b").unwrap();
        let drained = rx.drain_ready();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].as_ref(), b"b");
    }
}
