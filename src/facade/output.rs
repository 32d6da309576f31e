//! `DaemonOutputStream`: the output-stream half of the facade (C7),
//! grounded directly on `gfileoutputstreamdaemon.c`'s public entry points
//! (`g_daemon_file_output_stream_write`, `..._close`, `..._seek`).

use crate::cancel::CancellationToken;
use crate::channel::RawChannel;
use crate::config::Config;
use crate::connection::Connection;
use crate::driver::asynchronous::{AsyncOperation, AsyncStep};
use crate::driver::sync;
use crate::error::Error;
use crate::facade::State;
use crate::op::close::Close;
use crate::op::seek::Seek;
use crate::op::write::Write;
use std::io::SeekFrom;

/// One open remote file's write side.
pub struct DaemonOutputStream<C: RawChannel> {
    conn: Connection<C>,
    state: State,
}

impl<C: RawChannel> DaemonOutputStream<C> {
    /// `initial_offset` and `can_seek` mirror what the out-of-scope
    /// mount/open handshake would have already negotiated before handing
    /// this engine a live channel.
    pub fn new(channel: C, config: Config, initial_offset: u64, can_seek: bool) -> Self {
        DaemonOutputStream {
            conn: Connection::new(channel, config),
            state: State::new(initial_offset, can_seek),
        }
    }

    pub fn tell(&self) -> u64 {
        self.state.offset
    }

    pub fn can_seek(&self) -> bool {
        self.state.can_seek
    }

    /// Blocking write. Truncates silently to the connection's
    /// `max_write_size`; an empty buffer returns `Ok(0)` without putting
    /// anything on the wire.
    pub fn write(&mut self, buf: &[u8], cancel: &CancellationToken) -> Result<usize, Error> {
        if buf.is_empty() {
            self.state.begin()?;
            self.state.end();
            return Ok(0);
        }
        self.state.begin()?;
        let cap = self.conn.config().max_write_size;
        let payload = &buf[..buf.len().min(cap)];
        let seq = self.conn.alloc_seq_nr();
        let mut machine = Write::new(seq, payload);
        let result = sync::run(&mut machine, &mut self.conn, cancel);
        self.state.end();
        if let Ok(acked) = result {
            self.state.offset += acked as u64;
        }
        result.map(|n| n as usize)
    }

    /// Blocking close. Runs even if a previous operation failed; both
    /// half-channels are shut down regardless of the CLOSE reply's
    /// outcome.
    pub fn close(&mut self, cancel: &CancellationToken) -> Result<(), Error> {
        self.state.begin_close()?;
        let seq = self.conn.alloc_seq_nr();
        let mut machine = Close::new(seq);
        let result = sync::run(&mut machine, &mut self.conn, cancel);
        self.state.end_close();
        self.conn.close();
        result
    }

    /// Blocking seek. Fails with [`Error::NotSupported`] if the stream
    /// was not constructed as seekable.
    pub fn seek(&mut self, from: SeekFrom, cancel: &CancellationToken) -> Result<u64, Error> {
        if !self.state.can_seek {
            return Err(Error::NotSupported);
        }
        self.state.begin()?;
        let seq = self.conn.alloc_seq_nr();
        let mut machine = Seek::new(seq, from);
        let result = sync::run(&mut machine, &mut self.conn, cancel);
        self.state.end();
        if let Ok(offset) = result {
            self.state.offset = offset;
        }
        result
    }

    /// Starts a write without blocking. The returned handle must be
    /// polled to completion (or abandoned, which leaves the stream
    /// permanently `Pending` — matching the original's "one op at a
    /// time" invariant, which has no cancel-the-slot escape hatch either).
    pub fn write_async(&mut self, buf: &[u8]) -> Result<WriteAsync<'_, C>, Error> {
        if buf.is_empty() {
            self.state.begin()?;
            self.state.end();
            return Ok(WriteAsync::Done(Some(Ok(0))));
        }
        self.state.begin()?;
        let cap = self.conn.config().max_write_size;
        let payload = &buf[..buf.len().min(cap)];
        let seq = self.conn.alloc_seq_nr();
        let op = AsyncOperation::new(Write::new(seq, payload));
        Ok(WriteAsync::Pending(PendingWrite { stream: self, op }))
    }

    /// Starts a close without blocking.
    pub fn close_async(&mut self) -> Result<PendingClose<'_, C>, Error> {
        self.state.begin_close()?;
        let seq = self.conn.alloc_seq_nr();
        let op = AsyncOperation::new(Close::new(seq));
        Ok(PendingClose { stream: self, op })
    }
}

impl<C: RawChannel> crate::facade::VfsStream for DaemonOutputStream<C> {
    fn tell(&self) -> u64 {
        DaemonOutputStream::tell(self)
    }

    fn can_seek(&self) -> bool {
        DaemonOutputStream::can_seek(self)
    }

    fn seek(&mut self, from: SeekFrom, cancel: &CancellationToken) -> Result<u64, Error> {
        DaemonOutputStream::seek(self, from, cancel)
    }

    fn close(&mut self, cancel: &CancellationToken) -> Result<(), Error> {
        DaemonOutputStream::close(self, cancel)
    }
}

/// A write in flight, started by [`DaemonOutputStream::write_async`].
pub enum WriteAsync<'a, C: RawChannel> {
    /// Completed synchronously (the empty-buffer fast path) — nothing
    /// left to poll.
    Done(Option<Result<usize, Error>>),
    Pending(PendingWrite<'a, C>),
}

impl<'a, C: RawChannel> WriteAsync<'a, C> {
    pub fn poll(&mut self, cancel: &CancellationToken) -> AsyncStep<usize> {
        match self {
            WriteAsync::Done(slot) => AsyncStep::Done(slot.take().expect("WriteAsync polled again after completion")),
            WriteAsync::Pending(pending) => pending.poll(cancel),
        }
    }
}

pub struct PendingWrite<'a, C: RawChannel> {
    stream: &'a mut DaemonOutputStream<C>,
    op: AsyncOperation<Write>,
}

impl<'a, C: RawChannel> PendingWrite<'a, C> {
    pub fn poll(&mut self, cancel: &CancellationToken) -> AsyncStep<usize> {
        match self.op.poll(&mut self.stream.conn, cancel) {
            AsyncStep::Pending(h) => AsyncStep::Pending(h),
            AsyncStep::Done(result) => {
                self.stream.state.end();
                if let Ok(acked) = &result {
                    self.stream.state.offset += *acked as u64;
                }
                AsyncStep::Done(result.map(|n| n as usize))
            }
        }
    }
}

pub struct PendingClose<'a, C: RawChannel> {
    stream: &'a mut DaemonOutputStream<C>,
    op: AsyncOperation<Close>,
}

impl<'a, C: RawChannel> PendingClose<'a, C> {
    pub fn poll(&mut self, cancel: &CancellationToken) -> AsyncStep<()> {
        match self.op.poll(&mut self.stream.conn, cancel) {
            AsyncStep::Pending(h) => AsyncStep::Pending(h),
            AsyncStep::Done(result) => {
                self.stream.state.end_close();
                self.stream.conn.close();
                AsyncStep::Done(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockChannel;
    use crate::wire::{self, ReplyType};

    fn written_reply(seq_nr: u32, acked: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(ReplyType::Written as u32).to_be_bytes());
        buf.extend_from_slice(&seq_nr.to_be_bytes());
        buf.extend_from_slice(&acked.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf
    }

    fn closed_reply(seq_nr: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(ReplyType::Closed as u32).to_be_bytes());
        buf.extend_from_slice(&seq_nr.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf
    }

    #[test]
    fn write_advances_offset_by_acked_count_not_requested_count() {
        let mut stream = DaemonOutputStream::new(MockChannel::new(), Config::default(), 100, true);
        stream.conn.channel_mut().push_inbound(&written_reply(0, 2));
        let cancel = CancellationToken::never();
        let n = stream.write(&[0xAA; 5], &cancel).unwrap();
        assert_eq!(n, 2);
        assert_eq!(stream.tell(), 102);
    }

    #[test]
    fn empty_write_touches_no_wire() {
        let mut stream = DaemonOutputStream::new(MockChannel::new(), Config::default(), 0, false);
        let cancel = CancellationToken::never();
        assert_eq!(stream.write(&[], &cancel).unwrap(), 0);
        assert!(stream.conn.channel_mut().outbound.is_empty());
    }

    #[test]
    fn second_call_while_pending_fails() {
        // Abandoning an async operation before polling it to completion
        // leaves the stream's pending slot claimed, exactly like the
        // original never retrying an interrupted op on its own.
        let mut stream = DaemonOutputStream::new(MockChannel::new(), Config::default(), 0, false);
        let pending = stream.write_async(b"abc").unwrap();
        drop(pending);
        let cancel = CancellationToken::never();
        assert!(matches!(stream.write(b"more", &cancel), Err(Error::Pending)));
    }

    #[test]
    fn calls_after_close_fail_with_closed() {
        let mut stream = DaemonOutputStream::new(MockChannel::new(), Config::default(), 0, false);
        let seq = 0;
        stream.conn.channel_mut().push_inbound(&closed_reply(seq));
        let cancel = CancellationToken::never();
        stream.close(&cancel).unwrap();
        assert!(matches!(stream.write(b"x", &cancel), Err(Error::Closed)));
    }

    #[test]
    fn seek_on_non_seekable_stream_is_not_supported() {
        let mut stream = DaemonOutputStream::new(MockChannel::new(), Config::default(), 0, false);
        let cancel = CancellationToken::never();
        assert!(matches!(stream.seek(SeekFrom::Start(0), &cancel), Err(Error::NotSupported)));
    }

    #[test]
    fn seek_end_combines_arg1_and_arg2_into_a_64_bit_offset() {
        let mut stream = DaemonOutputStream::new(MockChannel::new(), Config::default(), 0, true);
        let mut reply = Vec::new();
        reply.extend_from_slice(&(ReplyType::SeekPos as u32).to_be_bytes());
        reply.extend_from_slice(&0u32.to_be_bytes());
        reply.extend_from_slice(&0x0000_0040u32.to_be_bytes());
        reply.extend_from_slice(&0x0000_0001u32.to_be_bytes());
        stream.conn.channel_mut().push_inbound(&reply);
        let cancel = CancellationToken::never();
        let offset = stream.seek(SeekFrom::End(0), &cancel).unwrap();
        assert_eq!(offset, 0x1_0000_0040);
        assert_eq!(stream.tell(), 0x1_0000_0040);
        let sent = &stream.conn.channel_mut().outbound;
        assert_eq!(u32::from_be_bytes(sent[8..12].try_into().unwrap()), 0);
        assert_eq!(u32::from_be_bytes(sent[12..16].try_into().unwrap()), 0);
    }

    #[test]
    fn write_larger_than_the_cap_is_truncated_before_it_reaches_the_wire() {
        let cap = 16;
        let config = Config {
            max_write_size: cap,
            ..Config::default()
        };
        let mut stream = DaemonOutputStream::new(MockChannel::new(), config, 0, false);
        stream.conn.channel_mut().push_inbound(&written_reply(0, cap as u32));
        let cancel = CancellationToken::never();
        let n = stream.write(&[0xAA; 1024], &cancel).unwrap();
        assert_eq!(n, cap);
        let sent = &stream.conn.channel_mut().outbound;
        assert_eq!(sent.len(), wire::REQUEST_HEADER_SIZE + cap);
        assert_eq!(u32::from_be_bytes(sent[8..12].try_into().unwrap()), cap as u32);
        assert_eq!(u32::from_be_bytes(sent[16..20].try_into().unwrap()), cap as u32);
    }

    #[test]
    fn close_shuts_down_both_halves_even_after_a_failed_write() {
        let mut stream = DaemonOutputStream::new(MockChannel::new(), Config::default(), 0, false);
        let mut error_reply = Vec::new();
        let payload = b"org.test\0disk full\0";
        error_reply.extend_from_slice(&(ReplyType::Error as u32).to_be_bytes());
        error_reply.extend_from_slice(&0u32.to_be_bytes());
        error_reply.extend_from_slice(&7u32.to_be_bytes());
        error_reply.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        error_reply.extend_from_slice(payload);
        stream.conn.channel_mut().push_inbound(&error_reply);
        let cancel = CancellationToken::never();
        assert!(stream.write(b"x", &cancel).is_err());

        stream.conn.channel_mut().push_inbound(&closed_reply(1));
        assert!(stream.close(&cancel).is_ok());
        assert!(stream.conn.channel_mut().read_closed);
        assert!(stream.conn.channel_mut().write_closed);
        assert!(matches!(stream.write(b"y", &cancel), Err(Error::Closed)));
    }
}
