//! Client-side core of a daemon-backed virtual filesystem stream protocol.
//!
//! This crate multiplexes read, write, seek, and close operations for one
//! open remote file over a single bidirectional byte channel, using a
//! length-prefixed binary wire format with out-of-order reply tolerance
//! and in-band cancellation. It is the engine underneath a pair of stream
//! facades ([`facade::output::DaemonOutputStream`],
//! [`facade::input::DaemonInputStream`]); everything above "I have an
//! open channel to a daemon" (mount negotiation, URI parsing, file-info
//! attribute modeling, bus name registration) is out of scope and left to
//! the embedder.
//!
//! Module map, leaves first:
//! - [`wire`] — the request/reply byte codec (pure, no I/O).
//! - [`cancel`] — the cancellation signal shared between a caller and a
//!   running operation.
//! - [`channel`] — the non-blocking byte-transport trait an embedder
//!   implements for its socket type.
//! - [`config`] — per-connection tunables (write cap, poll backoff).
//! - [`connection`] — owns one channel plus its sequence counter and
//!   inbound reply buffer.
//! - [`op`] — the per-operation state machines (Write, Read, Seek, Close,
//!   Skip).
//! - [`driver`] — the two disciplines that pump a state machine to
//!   completion: blocking ([`driver::sync`]) and cooperative-async
//!   ([`driver::asynchronous`]).
//! - [`poster`] — the event-loop posting facility the async driver's
//!   cancellation wakeup uses.
//! - [`facade`] — the public per-stream API.

pub mod cancel;
pub mod channel;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod facade;
#[cfg(not(feature = "logwise"))]
pub mod logging;
pub mod op;
pub mod poster;
mod sys;
pub mod wire;

pub use cancel::{CancellationSource, CancellationToken};
pub use config::Config;
pub use error::{Error, RemoteError};
pub use facade::input::DaemonInputStream;
pub use facade::output::DaemonOutputStream;
pub use facade::VfsStream;
