//! The connection endpoint (C2): owns the raw channel, the sequence-number
//! counter, and the inbound byte accumulator shared by whichever operation
//! is currently pending.
//!
//! Exactly one operation may be pending on a connection at a time (the
//! facade enforces this), so a single reusable inbound buffer is enough —
//! there is no per-operation demultiplexing to do.

use crate::channel::RawChannel;
use crate::config::Config;

/// The pieces an [`crate::op::OperationMachine`] needs on each poll,
/// borrowed out of a [`Connection`] so the machine itself never has to
/// know the channel's concrete type.
pub struct ConnectionParts<'a> {
    pub channel: &'a mut dyn RawChannel,
    pub inbound: &'a mut Vec<u8>,
    pub config: &'a Config,
    next_seq_nr: &'a mut u32,
}

impl<'a> ConnectionParts<'a> {
    /// Allocates a fresh request sequence number, the same counter
    /// [`Connection::alloc_seq_nr`] draws from. Used by a CANCEL frame,
    /// which gets its own number on the wire and carries the operation it
    /// targets in `arg1` rather than reusing that operation's `seq_nr`.
    pub(crate) fn alloc_seq_nr(&mut self) -> u32 {
        let seq = *self.next_seq_nr;
        *self.next_seq_nr = self.next_seq_nr.wrapping_add(1);
        seq
    }
}

/// One live connection to a VFS daemon.
pub struct Connection<C> {
    channel: C,
    inbound: Vec<u8>,
    next_seq_nr: u32,
    config: Config,
}

impl<C: RawChannel> Connection<C> {
    pub fn new(channel: C, config: Config) -> Self {
        Connection {
            channel,
            inbound: Vec::new(),
            next_seq_nr: 0,
            config,
        }
    }

    /// Allocates the next request sequence number. A CANCEL frame also
    /// draws from this counter (via [`ConnectionParts::alloc_seq_nr`]) —
    /// it gets its own number on the wire, carrying the operation it
    /// targets in `arg1` instead of reusing that operation's `seq_nr`.
    pub fn alloc_seq_nr(&mut self) -> u32 {
        let seq = self.next_seq_nr;
        self.next_seq_nr = self.next_seq_nr.wrapping_add(1);
        seq
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Direct access to the underlying channel, mainly useful to tests and
    /// to embedders that need the concrete type (e.g. to fetch a raw `fd`
    /// for external readiness polling).
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Borrows the channel, inbound buffer, and config together for a
    /// machine's `poll`.
    pub fn parts_mut(&mut self) -> ConnectionParts<'_> {
        ConnectionParts {
            channel: &mut self.channel,
            inbound: &mut self.inbound,
            config: &self.config,
            next_seq_nr: &mut self.next_seq_nr,
        }
    }

    /// Closes both halves of the underlying channel. Idempotent.
    pub fn close(&mut self) {
        let _ = self.channel.close_read();
        let _ = self.channel.close_write();
    }
}
