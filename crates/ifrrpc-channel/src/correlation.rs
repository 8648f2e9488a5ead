use std::borrow::Borrow;
use std::fmt;

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ChannelError, Result};

/// Length of every generated correlation id.
pub const CORRELATION_ID_LEN: usize = 12;

/// Attempts made by [`IdGenerator::next_id_avoiding`] before giving up.
pub const MAX_ID_ATTEMPTS: usize = 16;

/// Short random token matching one outbound call to its single reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Produces correlation ids from the 62-symbol alphanumeric alphabet.
///
/// The source is a seeded, non-cryptographic PRNG: ids are unpredictable
/// enough to avoid accidental collisions, not to resist a hostile peer.
pub struct IdGenerator {
    rng: StdRng,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Deterministic generator for tests and reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw one id. Uniqueness is probabilistic only.
    pub fn next_id(&mut self) -> CorrelationId {
        let id: String = (&mut self.rng)
            .sample_iter(Alphanumeric)
            .take(CORRELATION_ID_LEN)
            .map(char::from)
            .collect();
        CorrelationId(id)
    }

    /// Draw ids until `is_taken` accepts one.
    pub fn next_id_avoiding(&mut self, is_taken: impl Fn(&str) -> bool) -> Result<CorrelationId> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.next_id();
            if !is_taken(id.as_str()) {
                return Ok(id);
            }
            tracing::debug!(%id, "correlation id collision, drawing again");
        }
        Err(ChannelError::IdSpaceExhausted(MAX_ID_ATTEMPTS))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}
