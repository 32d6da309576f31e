//! The Seek operation's state machine. Shared by the input- and
//! output-stream facades; both ride the same SEEK_SET/SEEK_CUR/SEEK_END
//! commands.

use super::{OpPoll, OperationMachine, RequestReply};
use crate::cancel::CancellationToken;
use crate::connection::ConnectionParts;
use crate::error::Error;
use crate::wire::{self, Command, ReplyType};
use std::io::SeekFrom;

/// Sends one SEEK_{SET,CUR,END} request and yields the new absolute
/// offset the peer reports.
pub struct Seek {
    inner: RequestReply,
}

impl Seek {
    pub fn new(seq_nr: u32, from: SeekFrom) -> Self {
        let (command, raw_offset) = match from {
            SeekFrom::Start(off) => (Command::SeekSet, off as i64),
            SeekFrom::Current(off) => (Command::SeekCur, off),
            SeekFrom::End(off) => (Command::SeekEnd, off),
        };
        let bits = raw_offset as u64;
        let arg1 = (bits & 0xffff_ffff) as u32;
        let arg2 = (bits >> 32) as u32;
        let mut request = Vec::with_capacity(wire::REQUEST_HEADER_SIZE);
        wire::encode_request(&mut request, command, seq_nr, arg1, arg2, 0);
        Seek {
            inner: RequestReply::new(request, seq_nr),
        }
    }
}

impl OperationMachine for Seek {
    type Output = u64;

    fn poll(&mut self, parts: &mut ConnectionParts<'_>, cancel: &CancellationToken) -> OpPoll<u64> {
        self.inner.poll(parts, cancel, |reply, _payload| {
            if reply.kind == Some(ReplyType::SeekPos) {
                let offset = ((reply.arg2 as u64) << 32) | reply.arg1 as u64;
                Some(Ok(offset))
            } else {
                None
            }
        })
    }
}
