//! Fallback diagnostic logging used where the `logwise` feature is not enabled.
//!
//! This is intentionally not a full logging framework: it exists so that the
//! per-operation state machines and drivers can report fatal protocol
//! errors even when the crate is built without `logwise`. When `logwise` is
//! enabled, call sites prefer its structured macros instead (see `op::mod`,
//! `driver::sync`).

/// Writes a line to stderr.
pub fn log(message: &str) {
    eprintln!("{}", message);
}
