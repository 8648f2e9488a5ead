use std::time::Instant;

use ifrrpc_transport::{Conduit, Inbox, TransportError};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ChannelConfig;
use crate::correlation::{CorrelationId, IdGenerator};
use crate::dispatch::{Dispatch, Dispatcher, DropReason};
use crate::envelope::Envelope;
use crate::error::Result;
use crate::methods::{QUIT, READY};
use crate::outbox::Outbox;
use crate::registry::{CallOutcome, Caller, MethodTable};

/// Why [`Channel::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The peer sent `quit`.
    PeerQuit,
    /// The conduit reported the peer gone.
    PeerGone,
    /// The channel was closed locally.
    Closed,
    /// The caller's `keep_going` predicate returned false.
    Stopped,
}

/// One end of the two-peer RPC channel.
///
/// Owns the send half of a conduit, the static method table and the table of
/// calls awaiting replies. Everything runs on the thread that drives it:
/// feed inbound messages through [`Channel::handle_incoming`] or let
/// [`Channel::run`] pull them from an [`Inbox`].
///
/// Dropping the channel closes it, which tells the peer `quit`.
pub struct Channel<C: Conduit> {
    outbox: Outbox<C>,
    dispatcher: Dispatcher,
    config: ChannelConfig,
}

impl<C: Conduit> Channel<C> {
    pub fn new(conduit: C, methods: MethodTable, config: ChannelConfig) -> Self {
        Self::with_id_generator(conduit, methods, config, IdGenerator::new())
    }

    /// Like [`Channel::new`] with an explicit id source (seeded in tests).
    pub fn with_id_generator(
        conduit: C,
        methods: MethodTable,
        config: ChannelConfig,
        ids: IdGenerator,
    ) -> Self {
        let reserved = methods.names().into_iter().map(str::to_string).collect();
        debug!(
            transport = conduit.transport_name(),
            methods = ?methods.names(),
            "channel created"
        );
        Self {
            outbox: Outbox::new(
                conduit,
                ids,
                config.call_timeout,
                config.max_pending,
                reserved,
            ),
            dispatcher: Dispatcher::new(methods, config.max_message_size),
            config,
        }
    }

    /// Call `method` on the peer; `on_reply` runs exactly once with the
    /// reply, a timeout or a cancellation.
    pub fn call<F>(&mut self, method: &str, params: Vec<Value>, on_reply: F) -> Result<CorrelationId>
    where
        F: FnOnce(CallOutcome) + 'static,
    {
        self.outbox.call(method, params, Box::new(on_reply))
    }

    /// Fire-and-forget call.
    pub fn notify(&mut self, method: &str, params: Vec<Value>) -> Result<()> {
        self.outbox.notify(method, params)
    }

    /// Tell the peer this side is ready to take calls.
    pub fn announce_ready(&mut self) -> Result<()> {
        info!("announcing ready");
        self.notify(READY, Vec::new())
    }

    /// Dispatch one raw inbound message (the conduit's receive callback).
    pub fn handle_incoming(&mut self, raw: &[u8]) -> Dispatch {
        if self.outbox.is_closed() {
            debug!(size = raw.len(), "channel closed, ignoring inbound message");
            return Dispatch::Dropped(DropReason::ChannelClosed);
        }
        self.dispatcher.dispatch(raw, &mut self.outbox)
    }

    /// Take at most one message from `inbox`, dispatch it, then sweep
    /// overdue calls.
    pub fn poll<I: Inbox>(&mut self, inbox: &mut I) -> Result<Option<Dispatch>> {
        let dispatch = match inbox.next_message() {
            Ok(Some(raw)) => Some(self.handle_incoming(&raw)),
            Ok(None) => None,
            Err(err) => {
                if err.is_closed() {
                    self.outbox.mark_disconnected();
                }
                return Err(err.into());
            }
        };
        self.expire_pending(Instant::now());
        Ok(dispatch)
    }

    /// Drive the channel until the peer quits or disappears, or the channel
    /// is closed.
    pub fn run<I: Inbox>(&mut self, inbox: &mut I) -> Result<RunExit> {
        self.run_while(inbox, |_| true)
    }

    /// Drive the channel while `keep_going` holds.
    ///
    /// Pending calls are cancelled when the peer quits or disappears; a
    /// [`RunExit::Stopped`] exit leaves them in place.
    pub fn run_while<I, F>(&mut self, inbox: &mut I, mut keep_going: F) -> Result<RunExit>
    where
        I: Inbox,
        F: FnMut(&Self) -> bool,
    {
        loop {
            if self.outbox.is_closed() {
                return Ok(RunExit::Closed);
            }
            if self.dispatcher.peer_quit() {
                self.outbox.cancel_all();
                return Ok(RunExit::PeerQuit);
            }
            if !keep_going(self) {
                return Ok(RunExit::Stopped);
            }

            match self.poll(inbox) {
                Ok(_) => {}
                Err(crate::error::ChannelError::Transport(TransportError::Closed)) => {
                    info!("peer gone");
                    self.outbox.cancel_all();
                    return Ok(RunExit::PeerGone);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Resolve every call whose deadline passed as timed out.
    pub fn expire_pending(&mut self, now: Instant) -> usize {
        self.outbox.expire(now)
    }

    /// Send `quit`, cancel every pending call and stop accepting work.
    ///
    /// Safe to call more than once; only the first call has any effect.
    pub fn close(&mut self) {
        if self.outbox.is_closed() {
            return;
        }
        if !self.dispatcher.peer_quit() && !self.outbox.is_disconnected() {
            if let Err(err) = self
                .outbox
                .post_unchecked(&Envelope::notification(QUIT, Vec::new()))
            {
                debug!(error = %err, "quit notice not delivered");
            }
        }
        self.outbox.mark_closed();
        let cancelled = self.outbox.cancel_all();
        info!(cancelled, "channel closed");
    }

    pub fn is_peer_ready(&self) -> bool {
        self.dispatcher.peer_ready()
    }

    pub fn peer_quit(&self) -> bool {
        self.dispatcher.peer_quit()
    }

    pub fn is_closed(&self) -> bool {
        self.outbox.is_closed()
    }

    pub fn pending_len(&self) -> usize {
        self.outbox.pending_len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.outbox.next_deadline()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn conduit(&self) -> &C {
        self.outbox.conduit()
    }
}

impl<C: Conduit> Drop for Channel<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: Conduit> std::fmt::Debug for Channel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("transport", &self.outbox.conduit().transport_name())
            .field("outbox", &self.outbox)
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish()
    }
}
