//! Error message constants for HTTP handlers.
//!
//! User-facing error messages are sanitized to avoid leaking storage or
//! network details. Full error details are logged internally.

/// The event could not be recorded.
pub const APPEND_FAILED: &str = "Event could not be recorded";

/// History could not be read.
pub const HISTORY_UNAVAILABLE: &str = "Event history temporarily unavailable";

/// Catch-up against the relay failed.
pub const REPLAY_FAILED: &str = "Replay from relay failed";

/// The relay did not accept an event a service produced.
pub const SUBMIT_FAILED: &str = "Event could not be submitted to the relay";
