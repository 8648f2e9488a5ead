//! Static method table and pending-call table.
//!
//! Named methods and one-shot reply callbacks are kept in two separate maps:
//! a method name can never shadow a reply, and a reply callback is dropped
//! from its table the moment it fires, expires or is cancelled.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::correlation::CorrelationId;
use crate::error::{HandlerError, RegistryError, Result};
use crate::methods::{QUIT, READY};
use crate::params::Params;

/// Result of a handler: an optional single value to send back.
pub type HandlerResult = std::result::Result<Option<Value>, HandlerError>;

/// A permanently registered method.
pub type Handler = Box<dyn FnMut(Params, &mut dyn Caller) -> HandlerResult>;

/// A one-shot reply callback.
pub type ReplyCallback = Box<dyn FnOnce(CallOutcome)>;

/// Outbound side of the channel as seen from inside a handler.
///
/// Handlers may issue new calls while they run; those calls are posted
/// immediately and never re-enter the dispatcher.
pub trait Caller {
    /// Call `method` on the peer and run `on_reply` once with the outcome.
    fn call(
        &mut self,
        method: &str,
        params: Vec<Value>,
        on_reply: ReplyCallback,
    ) -> Result<CorrelationId>;

    /// Call `method` on the peer without expecting a reply.
    fn notify(&mut self, method: &str, params: Vec<Value>) -> Result<()>;
}

/// How an outbound call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The peer replied with this value.
    Replied(Value),
    /// No reply arrived before the call deadline.
    TimedOut,
    /// The call was abandoned: the channel closed or the pending table was full.
    Cancelled,
}

impl CallOutcome {
    pub fn into_value(self) -> Option<Value> {
        match self {
            CallOutcome::Replied(value) => Some(value),
            CallOutcome::TimedOut | CallOutcome::Cancelled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Replied(_) => "replied",
            CallOutcome::TimedOut => "timed_out",
            CallOutcome::Cancelled => "cancelled",
        }
    }
}

/// What happened when a static method was invoked.
#[derive(Debug)]
pub enum Invocation {
    /// No method with that name; the message is dropped.
    NotFound,
    /// The handler returned normally.
    Returned(Option<Value>),
    /// The handler reported an error.
    Failed(HandlerError),
    /// The handler panicked; the panic was contained.
    Panicked(String),
}

/// Fixed table of named methods, populated before the channel is active.
///
/// A new table already exposes [`READY`] and [`QUIT`] as no-ops; replace
/// them with [`MethodTable::on_ready`] and [`MethodTable::on_quit`].
pub struct MethodTable {
    handlers: HashMap<String, Handler>,
}

impl MethodTable {
    pub fn new() -> Self {
        let mut handlers: HashMap<String, Handler> = HashMap::new();
        handlers.insert(READY.to_string(), Box::new(|_, _| Ok(None)));
        handlers.insert(QUIT.to_string(), Box::new(|_, _| Ok(None)));
        Self { handlers }
    }

    /// Install a permanent method. Registering a name twice is an error.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
    ) -> std::result::Result<(), RegistryError>
    where
        F: FnMut(Params, &mut dyn Caller) -> HandlerResult + 'static,
    {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::DuplicateMethod(name));
        }
        debug!(method = %name, "registered method");
        self.handlers.insert(name, Box::new(handler));
        Ok(())
    }

    /// Replace the peer-ready handler.
    pub fn on_ready<F>(&mut self, handler: F)
    where
        F: FnMut(Params, &mut dyn Caller) -> HandlerResult + 'static,
    {
        self.handlers.insert(READY.to_string(), Box::new(handler));
    }

    /// Replace the teardown handler.
    pub fn on_quit<F>(&mut self, handler: F)
    where
        F: FnMut(Params, &mut dyn Caller) -> HandlerResult + 'static,
    {
        self.handlers.insert(QUIT.to_string(), Box::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn resolve(&mut self, name: &str) -> Option<&mut Handler> {
        self.handlers.get_mut(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Call the method `name` with positional `params`.
    ///
    /// An unknown name is not an error; it yields [`Invocation::NotFound`].
    /// Panics inside the handler are caught here so one faulty handler
    /// cannot take the receive loop down with it.
    pub fn invoke(&mut self, name: &str, params: Params, caller: &mut dyn Caller) -> Invocation {
        let Some(handler) = self.handlers.get_mut(name) else {
            return Invocation::NotFound;
        };

        match std::panic::catch_unwind(AssertUnwindSafe(|| handler(params, caller))) {
            Ok(Ok(result)) => Invocation::Returned(result),
            Ok(Err(err)) => Invocation::Failed(err),
            Err(payload) => Invocation::Panicked(panic_message(payload.as_ref())),
        }
    }
}

impl Default for MethodTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.names())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// An outbound call waiting for its reply.
pub struct PendingCall {
    method: String,
    deadline: Instant,
    seq: u64,
    callback: ReplyCallback,
}

impl PendingCall {
    /// Method the call was made to.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Consume the entry and run its callback.
    ///
    /// A panicking callback is logged and swallowed; it never unwinds into
    /// the receive loop.
    pub fn resolve(self, outcome: CallOutcome) {
        let method = self.method;
        let callback = self.callback;
        if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| callback(outcome))) {
            error!(
                %method,
                panic = %panic_message(payload.as_ref()),
                "reply callback panicked"
            );
        }
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("method", &self.method)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Bounded table of outbound calls keyed by correlation id.
#[derive(Debug)]
pub struct PendingCalls {
    entries: HashMap<CorrelationId, PendingCall>,
    capacity: usize,
    next_seq: u64,
}

impl PendingCalls {
    /// Create a table holding at most `capacity` calls (minimum one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            capacity,
            next_seq: 0,
        }
    }

    /// Register a one-shot reply callback under `id`.
    ///
    /// When the table is full the oldest entry is evicted and returned; the
    /// caller is expected to resolve it as [`CallOutcome::Cancelled`].
    pub fn register_once(
        &mut self,
        id: CorrelationId,
        method: &str,
        deadline: Instant,
        callback: ReplyCallback,
    ) -> Option<(CorrelationId, PendingCall)> {
        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries.insert(
            id,
            PendingCall {
                method: method.to_string(),
                deadline,
                seq,
                callback,
            },
        );
        evicted
    }

    /// Remove the entry for `id`, if any. A reply can only claim it once.
    pub fn take(&mut self, id: &str) -> Option<PendingCall> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Remove every entry whose deadline is at or before `now`, oldest first.
    pub fn expire(&mut self, now: Instant) -> Vec<(CorrelationId, PendingCall)> {
        let expired: Vec<CorrelationId> = self
            .entries
            .iter()
            .filter(|(_, call)| call.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        self.remove_ordered(expired)
    }

    /// Remove every entry, oldest first.
    pub fn drain(&mut self) -> Vec<(CorrelationId, PendingCall)> {
        let all: Vec<CorrelationId> = self.entries.keys().cloned().collect();
        self.remove_ordered(all)
    }

    /// Earliest deadline among pending calls.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|call| call.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_oldest(&mut self) -> Option<(CorrelationId, PendingCall)> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, call)| call.seq)
            .map(|(id, _)| id.clone())?;
        let call = self.entries.remove(&oldest)?;
        warn!(id = %oldest, method = %call.method, capacity = self.capacity, "pending call table full, evicting oldest call");
        Some((oldest, call))
    }

    fn remove_ordered(&mut self, ids: Vec<CorrelationId>) -> Vec<(CorrelationId, PendingCall)> {
        let mut removed: Vec<(CorrelationId, PendingCall)> = ids
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|call| (id, call)))
            .collect();
        removed.sort_by_key(|(_, call)| call.seq);
        removed
    }
}
