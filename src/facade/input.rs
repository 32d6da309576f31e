//! `DaemonInputStream`: the input-stream half of the facade (C7), mirroring
//! [`super::output::DaemonOutputStream`] over the Read/Skip/Seek/Close
//! state machines, grounded on `gdaemonfileinputstream.h`'s constructor
//! shape (`fd`, `can_seek`) and the output stream's sibling behavior
//! where the original source for this half did not survive retrieval.

use crate::cancel::CancellationToken;
use crate::channel::RawChannel;
use crate::config::Config;
use crate::connection::Connection;
use crate::driver::asynchronous::{AsyncOperation, AsyncStep};
use crate::driver::sync;
use crate::error::Error;
use crate::facade::State;
use crate::op::close::Close;
use crate::op::read::Read;
use crate::op::seek::Seek;
use crate::op::skip::Skip;
use std::io::SeekFrom;

/// One open remote file's read side.
pub struct DaemonInputStream<C: RawChannel> {
    conn: Connection<C>,
    state: State,
}

/// Rejects a count that would not fit in the wire's signed 32-bit `arg1`
/// field, rather than silently truncating it to something that does.
fn validate_count(count: usize) -> Result<u32, Error> {
    const MAX_SIGNED: usize = 1usize << 31;
    if count >= MAX_SIGNED {
        return Err(Error::InvalidArgument("count exceeds the protocol's signed 32-bit range"));
    }
    Ok(count as u32)
}

impl<C: RawChannel> DaemonInputStream<C> {
    pub fn new(channel: C, config: Config, initial_offset: u64, can_seek: bool) -> Self {
        DaemonInputStream {
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

    /// Blocking read. Requests up to `buf.len()` bytes; the peer may
    /// deliver fewer, including zero at end-of-stream (not itself an
    /// error, unlike a zero-byte read reply mid-frame on the wire).
    pub fn read(&mut self, buf: &mut [u8], cancel: &CancellationToken) -> Result<usize, Error> {
        if buf.is_empty() {
            self.state.begin()?;
            self.state.end();
            return Ok(0);
        }
        let requested = validate_count(buf.len())?;
        self.state.begin()?;
        let seq = self.conn.alloc_seq_nr();
        let mut machine = Read::new(seq, requested);
        let result = sync::run(&mut machine, &mut self.conn, cancel);
        self.state.end();
        match result {
            Ok(data) => {
                let n = data.len();
                buf[..n].copy_from_slice(&data);
                self.state.offset += n as u64;
                Ok(n)
            }
            Err(e) => Err(e),
        }
    }

    /// Blocking skip: discards up to `count` bytes the peer already has
    /// queued (e.g. left over from a prior Read) without returning them.
    pub fn skip(&mut self, count: usize, cancel: &CancellationToken) -> Result<usize, Error> {
        if count == 0 {
            self.state.begin()?;
            self.state.end();
            return Ok(0);
        }
        let requested = validate_count(count)?;
        self.state.begin()?;
        let mut machine = Skip::new(requested);
        let result = sync::run(&mut machine, &mut self.conn, cancel);
        self.state.end();
        if let Ok(n) = result {
            self.state.offset += n as u64;
        }
        result.map(|n| n as usize)
    }

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

    pub fn close(&mut self, cancel: &CancellationToken) -> Result<(), Error> {
        self.state.begin_close()?;
        let seq = self.conn.alloc_seq_nr();
        let mut machine = Close::new(seq);
        let result = sync::run(&mut machine, &mut self.conn, cancel);
        self.state.end_close();
        self.conn.close();
        result
    }

    /// Starts a read without blocking.
    pub fn read_async(&mut self, requested: usize) -> Result<ReadAsync<'_, C>, Error> {
        if requested == 0 {
            self.state.begin()?;
            self.state.end();
            return Ok(ReadAsync::Done(Some(Ok(Vec::new()))));
        }
        let requested = validate_count(requested)?;
        self.state.begin()?;
        let seq = self.conn.alloc_seq_nr();
        let op = AsyncOperation::new(Read::new(seq, requested));
        Ok(ReadAsync::Pending(PendingRead { stream: self, op }))
    }

    /// Starts a close without blocking.
    pub fn close_async(&mut self) -> Result<PendingClose<'_, C>, Error> {
        self.state.begin_close()?;
        let seq = self.conn.alloc_seq_nr();
        let op = AsyncOperation::new(Close::new(seq));
        Ok(PendingClose { stream: self, op })
    }
}

impl<C: RawChannel> crate::facade::VfsStream for DaemonInputStream<C> {
    fn tell(&self) -> u64 {
        DaemonInputStream::tell(self)
    }

    fn can_seek(&self) -> bool {
        DaemonInputStream::can_seek(self)
    }

    fn seek(&mut self, from: SeekFrom, cancel: &CancellationToken) -> Result<u64, Error> {
        DaemonInputStream::seek(self, from, cancel)
    }

    fn close(&mut self, cancel: &CancellationToken) -> Result<(), Error> {
        DaemonInputStream::close(self, cancel)
    }
}

/// A read in flight, started by [`DaemonInputStream::read_async`]. Yields
/// the bytes read (the caller copies them wherever it likes, unlike the
/// blocking `read` which writes directly into a caller buffer).
pub enum ReadAsync<'a, C: RawChannel> {
    Done(Option<Result<Vec<u8>, Error>>),
    Pending(PendingRead<'a, C>),
}

impl<'a, C: RawChannel> ReadAsync<'a, C> {
    pub fn poll(&mut self, cancel: &CancellationToken) -> AsyncStep<Vec<u8>> {
        match self {
            ReadAsync::Done(slot) => AsyncStep::Done(slot.take().expect("ReadAsync polled again after completion")),
            ReadAsync::Pending(pending) => pending.poll(cancel),
        }
    }
}

pub struct PendingRead<'a, C: RawChannel> {
    stream: &'a mut DaemonInputStream<C>,
    op: AsyncOperation<Read>,
}

impl<'a, C: RawChannel> PendingRead<'a, C> {
    pub fn poll(&mut self, cancel: &CancellationToken) -> AsyncStep<Vec<u8>> {
        match self.op.poll(&mut self.stream.conn, cancel) {
            AsyncStep::Pending(h) => AsyncStep::Pending(h),
            AsyncStep::Done(result) => {
                self.stream.state.end();
                if let Ok(data) = &result {
                    self.stream.state.offset += data.len() as u64;
                }
                AsyncStep::Done(result)
            }
        }
    }
}

pub struct PendingClose<'a, C: RawChannel> {
    stream: &'a mut DaemonInputStream<C>,
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
