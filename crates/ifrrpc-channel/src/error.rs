/// Reasons an inbound message is not a usable envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The message is not valid JSON.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// The message is JSON but not an object.
    #[error("envelope is not a json object")]
    NotAnObject,

    /// `method` is absent or not a string.
    #[error("envelope has no string method")]
    MissingMethod,

    /// The raw message exceeds the configured limit.
    #[error("envelope too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },
}

/// Errors raised while populating the method table.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A static method with this name is already installed.
    #[error("method '{0}' is already registered")]
    DuplicateMethod(String),
}

/// Failure reported by a handler. Logged by the dispatcher, never sent back.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A positional argument is missing or has the wrong shape.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The handler ran but could not complete.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Lets handlers use `?` on outbound calls made through their `Caller`.
impl From<ChannelError> for HandlerError {
    fn from(err: ChannelError) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Errors surfaced to local callers of the channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ifrrpc_transport::TransportError),

    /// Outbound envelope could not be encoded.
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Method table error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The channel was already closed locally.
    #[error("channel closed")]
    Closed,

    /// No free correlation id was found.
    #[error("no free correlation id after {0} attempts")]
    IdSpaceExhausted(usize),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
