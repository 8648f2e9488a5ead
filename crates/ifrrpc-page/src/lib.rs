//! Page-side collaborators for ifrrpc.
//!
//! The page exposes three methods to the hidden frame: the ready handshake,
//! an on-demand preference push and a suggestions sink. They read the host
//! page through [`PageEnvironment`]: who the page is ([`PageIdentity`]) and
//! what its cookie and session storage hold ([`PrefsSource`]).

pub mod environment;
pub mod error;
pub mod identity;
pub mod methods;
pub mod prefs;

pub use environment::{PageEnvironment, StaticPage};
pub use error::{PageError, Result};
pub use identity::PageIdentity;
pub use methods::{PageMethods, SuggestionSink};
pub use prefs::{extract_prefs, Prefs, PrefsExtractor, PrefsSource, GID_PATTERN, LOC_PATTERN};
