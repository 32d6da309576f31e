//! Platform primitives the rest of the crate builds on.
//!
//! Kept as its own module, in the style of the crate this engine grew out
//! of, so that a future non-native target (the original carried a wasm32
//! variant here) has one place to land without touching callers.

pub use std::thread;
pub use std::time;
