//! Well-known method names.
//!
//! Every method table carries [`READY`] and [`QUIT`]. The remaining names are
//! the domain methods each side exposes to the other.

/// Peer-ready handshake, sent by the frame side once it can take calls.
pub const READY: &str = "backendReady";

/// Teardown notice, sent fire-and-forget when a side goes away.
pub const QUIT: &str = "quit";

/// Page side: harvest and push preferences on demand.
pub const DEFAULT_PREFS: &str = "defaultPrefs";

/// Page side: receive suggestions computed by the frame side.
pub const SUGGESTIONS: &str = "suggestions";

/// Frame side: receive harvested preferences.
pub const PREFS: &str = "prefs";

/// Frame side: receive the current page identity.
pub const HISTORY: &str = "history";

/// Frame side: liveness probe, answers `"pong"`.
pub const PING: &str = "ping";

/// Entries installed in every method table.
pub const BUILTIN_METHODS: [&str; 2] = [READY, QUIT];

/// Methods the page side exposes.
pub const PAGE_METHODS: [&str; 3] = [READY, DEFAULT_PREFS, SUGGESTIONS];

/// Methods the frame side exposes.
pub const FRAME_METHODS: [&str; 4] = [PREFS, HISTORY, PING, QUIT];

/// True for the entries every table carries.
pub fn is_builtin(method: &str) -> bool {
    BUILTIN_METHODS.contains(&method)
}
