use ifrrpc_transport::Conduit;
use tracing::{debug, error, info, warn};

use crate::envelope::Envelope;
use crate::methods::{QUIT, READY};
use crate::outbox::Outbox;
use crate::params::Params;
use crate::registry::{CallOutcome, Invocation, MethodTable};

/// Whether a handler invocation is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Dispatching,
}

/// Why an inbound message was dropped without running anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not a decodable envelope.
    Malformed,
    /// Neither a pending correlation id nor a registered method.
    UnknownMethod,
    /// The local side already closed the channel.
    ChannelClosed,
}

/// What the dispatcher did with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Dropped(DropReason),
    /// A reply fired the callback of the pending call `id`.
    Resolved { id: String },
    /// A static method ran; `replied` tells whether a reply envelope went out.
    Handled { method: String, replied: bool },
    /// A static method failed or panicked; nothing was sent back.
    Faulted { method: String },
}

/// Routes inbound envelopes to reply callbacks and static methods.
pub struct Dispatcher {
    methods: MethodTable,
    state: DispatchState,
    max_message_size: usize,
    peer_ready: bool,
    peer_quit: bool,
}

impl Dispatcher {
    pub fn new(methods: MethodTable, max_message_size: usize) -> Self {
        Self {
            methods,
            state: DispatchState::Idle,
            max_message_size,
            peer_ready: false,
            peer_quit: false,
        }
    }

    /// Handle one raw inbound message.
    ///
    /// Replies are matched against pending calls first, then the static
    /// method table. Malformed input and unknown names are dropped; handler
    /// failures are contained and answered with silence.
    pub fn dispatch<C: Conduit>(&mut self, raw: &[u8], outbox: &mut Outbox<C>) -> Dispatch {
        let envelope = match Envelope::decode_bounded(raw, self.max_message_size) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(error = %err, size = raw.len(), "dropping malformed envelope");
                return Dispatch::Dropped(DropReason::Malformed);
            }
        };

        self.state = DispatchState::Dispatching;
        let outcome = self.route(envelope, outbox);
        self.state = DispatchState::Idle;
        outcome
    }

    fn route<C: Conduit>(&mut self, envelope: Envelope, outbox: &mut Outbox<C>) -> Dispatch {
        let Envelope {
            method, params, id, ..
        } = envelope;

        if let Some(call) = outbox.take_pending(&method) {
            debug!(id = %method, call = call.method(), "reply received");
            call.resolve(CallOutcome::Replied(Params::new(params).into_reply_value()));
            return Dispatch::Resolved { id: method };
        }

        let invocation = self.methods.invoke(&method, Params::new(params), outbox);
        if !matches!(invocation, Invocation::NotFound) {
            self.observe(&method);
        }

        match invocation {
            Invocation::NotFound => {
                debug!(%method, "no handler registered, dropping message");
                Dispatch::Dropped(DropReason::UnknownMethod)
            }
            Invocation::Returned(Some(result)) => {
                let Some(id) = id else {
                    return Dispatch::Handled {
                        method,
                        replied: false,
                    };
                };
                let replied = match outbox.reply(&id, result) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(%method, %id, error = %err, "failed to send reply");
                        false
                    }
                };
                Dispatch::Handled { method, replied }
            }
            Invocation::Returned(None) => Dispatch::Handled {
                method,
                replied: false,
            },
            Invocation::Failed(err) => {
                warn!(%method, error = %err, "handler failed, no reply sent");
                Dispatch::Faulted { method }
            }
            Invocation::Panicked(message) => {
                error!(%method, panic = %message, "handler panicked, no reply sent");
                Dispatch::Faulted { method }
            }
        }
    }

    fn observe(&mut self, method: &str) {
        match method {
            READY if !self.peer_ready => {
                info!("peer ready");
                self.peer_ready = true;
            }
            QUIT if !self.peer_quit => {
                info!("peer quit");
                self.peer_quit = true;
            }
            _ => {}
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    pub fn peer_ready(&self) -> bool {
        self.peer_ready
    }

    pub fn peer_quit(&self) -> bool {
        self.peer_quit
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("methods", &self.methods)
            .field("state", &self.state)
            .field("peer_ready", &self.peer_ready)
            .field("peer_quit", &self.peer_quit)
            .finish()
    }
}
