//! The crate's single error currency.
//!
//! Mirrors how the crate this engine is descended from centralizes
//! transport failures into one `thiserror`-derived enum per component
//! (`bidirectional_proxy::Error`, `transit_proxy::Error`) rather than
//! letting raw `std::io::Error` leak across module boundaries.

use std::fmt;

/// An error carried verbatim from an `ERROR` reply whose `seq_nr` matched
/// the operation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// The domain identifier preceding the first NUL in the error payload.
    pub domain: String,
    /// The reply's `arg1`, a domain-specific numeric code.
    pub code: u32,
    /// The message following the domain's NUL terminator.
    pub message: String,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.domain, self.code, self.message)
    }
}

/// All error kinds the engine can produce.
///
/// These are kinds, not wire types: only [`Error::Remote`] carries a
/// payload that originated on the wire. Everything else is raised locally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cancellation signal was observed before the operation's payload
    /// was acknowledged by the peer.
    #[error("operation was cancelled")]
    Cancelled,

    /// The stream was already closed when the operation was attempted.
    #[error("stream is closed")]
    Closed,

    /// Another operation on this stream has not yet completed.
    #[error("another operation is already pending on this stream")]
    Pending,

    /// Seek was attempted on a stream that was not constructed as seekable.
    #[error("seek is not supported on this stream")]
    NotSupported,

    /// A count argument could not be represented in the protocol's 32-bit
    /// fields (or would overflow a signed word).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The underlying channel failed, or the peer closed the connection
    /// mid-frame. Fatal: the caller should close the stream.
    #[error("error in stream protocol: {0}")]
    ProtocolIo(String),

    /// An `ERROR` reply whose `seq_nr` matched the operation's.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl Error {
    /// True for the single error kind that leaves the operation retryable
    /// in spirit (the stream itself is still usable for the next op).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
