//! The stream facade (C7): the public surface embedders actually call,
//! enforcing the "closed" / "pending" lifecycle on top of the connection
//! and state machines underneath.
//!
//! Split into [`output`] (`DaemonOutputStream`, grounded on
//! `gfileoutputstreamdaemon.c`) and [`input`] (`DaemonInputStream`, its
//! mirror per the read/skip operations), sharing the same lifecycle guard
//! here.

pub mod input;
pub mod output;

use crate::cancel::CancellationToken;
use crate::error::Error;
use std::io::SeekFrom;

/// The capability set both stream facades expose, replacing the source's
/// class-hierarchy dispatch (`GOutputStream`/`GInputStream` subclassing)
/// with one small trait implemented by both concrete stream types.
///
/// File-info attribute querying is deliberately not part of this trait:
/// it is named in the facade's public surface only as a pass-through to
/// the out-of-scope file-info attribute modeling collaborator, which this
/// crate does not implement.
pub trait VfsStream {
    fn tell(&self) -> u64;
    fn can_seek(&self) -> bool;
    fn seek(&mut self, from: SeekFrom, cancel: &CancellationToken) -> Result<u64, Error>;
    fn close(&mut self, cancel: &CancellationToken) -> Result<(), Error>;
}

/// Lifecycle state shared by both stream facades: at most one operation
/// pending at a time, and nothing usable once closed.
pub(crate) struct State {
    pub closed: bool,
    pub pending: bool,
    pub offset: u64,
    pub can_seek: bool,
}

impl State {
    pub fn new(initial_offset: u64, can_seek: bool) -> Self {
        State {
            closed: false,
            pending: false,
            offset: initial_offset,
            can_seek,
        }
    }

    /// Enforces "closed everything fails, pending everything fails,
    /// otherwise claim the pending slot" before starting any operation
    /// other than close.
    pub fn begin(&mut self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.pending {
            return Err(Error::Pending);
        }
        self.pending = true;
        Ok(())
    }

    /// Enforces the same rule for `close()`, which additionally is the
    /// one call allowed to run even though it will leave the stream
    /// unusable afterward.
    pub fn begin_close(&mut self) -> Result<(), Error> {
        self.begin()
    }

    pub fn end(&mut self) {
        self.pending = false;
    }

    pub fn end_close(&mut self) {
        self.pending = false;
        self.closed = true;
    }
}
