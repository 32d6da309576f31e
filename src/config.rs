//! Tunables for one connection.
//!
//! The original protocol hardcodes its write cap and backoff interval as
//! preprocessor constants; here they're fields on a `Config` so an embedder
//! wiring this engine into a larger VFS client can override them per
//! connection without touching the engine's source, while [`Config::default`]
//! reproduces the original numbers exactly.

use std::time::Duration;

/// Per-connection limits and timing.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Per-write cap in bytes. Requests larger than this are silently
    /// truncated by the facade before entering the state machine.
    pub max_write_size: usize,
    /// Backoff between poll attempts when a non-blocking channel reports
    /// `WouldBlock`, used by the bundled blocking-over-non-blocking
    /// channel adapter.
    pub poll_backoff: Duration,
}

/// The protocol's write cap: 4 MiB, matching the original implementation.
pub const MAX_WRITE_SIZE: usize = 4 * 1024 * 1024;

impl Default for Config {
    fn default() -> Self {
        Config {
            max_write_size: MAX_WRITE_SIZE,
            poll_backoff: Duration::from_millis(1),
        }
    }
}
