use std::time::Duration;

/// Controls channel behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// How long an outbound call waits for its reply before timing out.
    pub call_timeout: Duration,
    /// Maximum number of calls waiting for a reply at once.
    pub max_pending: usize,
    /// Inbound messages larger than this are dropped undecoded.
    pub max_message_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            max_pending: 256,
            max_message_size: 1024 * 1024,
        }
    }
}
