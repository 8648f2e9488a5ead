use std::fmt;
use std::io;

use ifrrpc_channel::ChannelError;
use ifrrpc_page::PageError;
use ifrrpc_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PayloadTooLarge { .. } | TransportError::InvalidMagic => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        TransportError::PathTooLong { .. } => CliError::usage(format!("{context}: {err}")),
        TransportError::WriteTimeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TransportError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Transport(err) => transport_error(context, err),
        ChannelError::Envelope(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ChannelError::Registry(err) => CliError::new(INTERNAL, format!("{context}: {err}")),
        ChannelError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        ChannelError::IdSpaceExhausted(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn page_error(context: &str, err: PageError) -> CliError {
    match err {
        PageError::Read { source, .. } => io_error(context, source),
        PageError::Json(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_channel_is_failure() {
        assert_eq!(channel_error("send", ChannelError::Closed).code, FAILURE);
        assert_eq!(
            channel_error("send", ChannelError::Transport(TransportError::Closed)).code,
            FAILURE
        );
    }

    #[test]
    fn missing_socket_is_transport_error() {
        let err = TransportError::Connect {
            path: "/tmp/none.sock".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(transport_error("connect", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn stalled_write_is_timeout() {
        let err = TransportError::WriteTimeout {
            written: 0,
            total: 64,
        };
        assert_eq!(transport_error("send", err).code, TIMEOUT);
    }

    #[test]
    fn oversized_payload_is_data_invalid() {
        let err = TransportError::PayloadTooLarge { size: 10, max: 1 };
        assert_eq!(transport_error("recv", err).code, DATA_INVALID);
    }
}
