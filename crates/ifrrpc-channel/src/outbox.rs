use std::collections::HashSet;
use std::time::{Duration, Instant};

use ifrrpc_transport::{Conduit, TransportError};
use serde_json::Value;
use tracing::{debug, trace};

use crate::correlation::{CorrelationId, IdGenerator};
use crate::envelope::Envelope;
use crate::error::{ChannelError, Result};
use crate::registry::{CallOutcome, Caller, PendingCall, PendingCalls, ReplyCallback};

/// Sending half of a channel: the conduit plus every call awaiting a reply.
pub struct Outbox<C> {
    conduit: C,
    pending: PendingCalls,
    ids: IdGenerator,
    call_timeout: Duration,
    /// Static method names; generated ids must never equal one of them.
    reserved: HashSet<String>,
    closed: bool,
    disconnected: bool,
}

impl<C: Conduit> Outbox<C> {
    pub(crate) fn new(
        conduit: C,
        ids: IdGenerator,
        call_timeout: Duration,
        max_pending: usize,
        reserved: HashSet<String>,
    ) -> Self {
        Self {
            conduit,
            pending: PendingCalls::with_capacity(max_pending),
            ids,
            call_timeout,
            reserved,
            closed: false,
            disconnected: false,
        }
    }

    /// Send the single-value reply to the call tagged `id`.
    pub(crate) fn reply(&mut self, id: &str, result: Value) -> Result<()> {
        self.post(&Envelope::reply(id, result))
    }

    pub(crate) fn take_pending(&mut self, id: &str) -> Option<PendingCall> {
        self.pending.take(id)
    }

    /// Resolve every overdue call as [`CallOutcome::TimedOut`].
    pub(crate) fn expire(&mut self, now: Instant) -> usize {
        let expired = self.pending.expire(now);
        let count = expired.len();
        for (id, call) in expired {
            debug!(%id, method = call.method(), "call timed out without reply");
            call.resolve(CallOutcome::TimedOut);
        }
        count
    }

    /// Resolve every pending call as [`CallOutcome::Cancelled`].
    pub(crate) fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.drain();
        let count = cancelled.len();
        for (id, call) in cancelled {
            debug!(%id, method = call.method(), "call cancelled");
            call.resolve(CallOutcome::Cancelled);
        }
        count
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.disconnected = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    pub fn conduit(&self) -> &C {
        &self.conduit
    }

    /// Post regardless of the closed flag; used for the final `quit`.
    pub(crate) fn post_unchecked(&mut self, envelope: &Envelope) -> Result<()> {
        let raw = envelope.encode()?;
        trace!(method = %envelope.method, size = raw.len(), "posting envelope");
        match self.conduit.post(&raw) {
            Ok(()) => Ok(()),
            Err(TransportError::Closed) => {
                self.disconnected = true;
                Err(TransportError::Closed.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn post(&mut self, envelope: &Envelope) -> Result<()> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        self.post_unchecked(envelope)
    }
}

impl<C: Conduit> Caller for Outbox<C> {
    fn call(
        &mut self,
        method: &str,
        params: Vec<Value>,
        on_reply: ReplyCallback,
    ) -> Result<CorrelationId> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        let pending = &self.pending;
        let reserved = &self.reserved;
        let id = self
            .ids
            .next_id_avoiding(|candidate| pending.contains(candidate) || reserved.contains(candidate))?;

        // Registered only once posted: a failed send leaves the table untouched.
        self.post(&Envelope::call(method, params, id.as_str()))?;

        let deadline = Instant::now() + self.call_timeout;
        if let Some((evicted_id, evicted)) =
            self.pending
                .register_once(id.clone(), method, deadline, on_reply)
        {
            debug!(id = %evicted_id, method = evicted.method(), "cancelling evicted call");
            evicted.resolve(CallOutcome::Cancelled);
        }

        debug!(%id, %method, "call sent");
        Ok(id)
    }

    fn notify(&mut self, method: &str, params: Vec<Value>) -> Result<()> {
        self.post(&Envelope::notification(method, params))?;
        debug!(%method, "notification sent");
        Ok(())
    }
}

impl<C> std::fmt::Debug for Outbox<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("pending", &self.pending.len())
            .field("call_timeout", &self.call_timeout)
            .field("closed", &self.closed)
            .field("disconnected", &self.disconnected)
            .finish()
    }
}
