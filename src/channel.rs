//! The raw half-channel capability (§6 "byte-channel capability") that the
//! connection endpoint is built on.
//!
//! This plays the role `bidirectional_proxy::{ReadTransport, WriteTransport}`
//! played in the crate this engine grew out of: a narrow trait an embedder
//! implements for whatever socket type it has, so the engine never needs to
//! know about `TcpStream` vs. `UnixStream` vs. something else entirely.
//! Unlike that pair, one trait covers both directions, because here both
//! halves are always the two ends of a single file descriptor.

use std::io;

/// One connection's raw, non-blocking-capable byte transport.
///
/// Implementations must never block: a read or write that cannot make
/// progress immediately returns `Err` with [`io::ErrorKind::WouldBlock`].
/// The connection endpoint built on top of this trait is what turns that
/// into either genuine blocking (the sync driver, by polling with a
/// backoff) or a registered completion (the async driver).
pub trait RawChannel {
    /// Reads into `buf` without blocking. `Ok(0)` means either "no data
    /// right now" (caller should treat as a `WouldBlock` retry case only
    /// if it also checks `is_would_block`) or genuine end-of-stream,
    /// exactly like [`std::io::Read::read`] — implementations should
    /// instead prefer returning `Err(WouldBlock)` when no data is
    /// available so `Ok(0)` unambiguously means end-of-stream.
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes from `buf` without blocking, returning the number of bytes
    /// actually accepted (may be less than `buf.len()`).
    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Discards up to `len` bytes from the inbound side without blocking,
    /// returning the number actually discarded.
    fn try_skip(&mut self, len: usize) -> io::Result<usize>;

    /// Closes the inbound half. Idempotent: calling twice is not an error.
    fn close_read(&mut self) -> io::Result<()>;

    /// Closes the outbound half. Idempotent: calling twice is not an error.
    fn close_write(&mut self) -> io::Result<()>;
}

/// True if `err` is the `WouldBlock` a [`RawChannel`] uses to mean "no
/// progress available right now, try again".
pub fn is_would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(unix)]
mod unix_socket {
    use super::RawChannel;
    use std::io;
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    /// A [`RawChannel`] over one end of a Unix domain socket, the transport
    /// a VFS daemon connection normally rides on.
    ///
    /// `skip` has no dedicated syscall; it reads into a scratch buffer and
    /// discards it, same as the original's reliance on `g_input_stream_skip`
    /// falling back to reads when the stream has no seek-ahead primitive.
    #[derive(Debug)]
    pub struct UnixSocketChannel {
        stream: UnixStream,
    }

    impl UnixSocketChannel {
        pub fn new(stream: UnixStream) -> io::Result<Self> {
            stream.set_nonblocking(true)?;
            Ok(UnixSocketChannel { stream })
        }
    }

    impl RawChannel for UnixSocketChannel {
        fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.stream.read(buf)
        }

        fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.stream.write(buf)
        }

        fn try_skip(&mut self, len: usize) -> io::Result<usize> {
            let mut scratch = vec![0u8; len.min(64 * 1024)];
            self.stream.read(&mut scratch)
        }

        fn close_read(&mut self) -> io::Result<()> {
            self.stream.shutdown(std::net::Shutdown::Read)
        }

        fn close_write(&mut self) -> io::Result<()> {
            self.stream.shutdown(std::net::Shutdown::Write)
        }
    }
}

#[cfg(unix)]
pub use unix_socket::UnixSocketChannel;

#[cfg(test)]
pub(crate) mod mock {
    //! An in-memory [`RawChannel`] for driver and state-machine tests.
    //!
    //! `outbound` collects whatever the engine writes (so a test can
    //! assert on exact bytes-on-the-wire), `inbound` is fed by the test to
    //! simulate replies, and `chunk_limit` lets a test force partial reads
    //! and writes to exercise the resilience properties.

    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    pub struct MockChannel {
        pub outbound: Vec<u8>,
        pub inbound: VecDeque<u8>,
        pub chunk_limit: Option<usize>,
        pub read_closed: bool,
        pub write_closed: bool,
    }

    impl MockChannel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_inbound(&mut self, bytes: &[u8]) {
            self.inbound.extend(bytes.iter().copied());
        }
    }

    impl RawChannel for MockChannel {
        fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.inbound.is_empty() {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"));
            }
            let want = buf.len().min(self.chunk_limit.unwrap_or(usize::MAX));
            let mut n = 0;
            while n < want {
                match self.inbound.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }

        fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let want = buf.len().min(self.chunk_limit.unwrap_or(usize::MAX)).max(1);
            self.outbound.extend_from_slice(&buf[..want]);
            Ok(want)
        }

        fn try_skip(&mut self, len: usize) -> io::Result<usize> {
            let mut n = 0;
            while n < len {
                if self.inbound.pop_front().is_none() {
                    break;
                }
                n += 1;
            }
            Ok(n)
        }

        fn close_read(&mut self) -> io::Result<()> {
            self.read_closed = true;
            Ok(())
        }

        fn close_write(&mut self) -> io::Result<()> {
            self.write_closed = true;
            Ok(())
        }
    }
}
