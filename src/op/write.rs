//! The Write operation's state machine.

use super::{OpPoll, OperationMachine, RequestReply};
use crate::cancel::CancellationToken;
use crate::connection::ConnectionParts;
use crate::error::Error;
use crate::wire::{self, Command, ReplyType};

/// Sends `buf` as one WRITE request and yields the number of bytes the
/// peer acknowledged, which may be less than `buf.len()`.
pub struct Write {
    inner: RequestReply,
}

impl Write {
    pub fn new(seq_nr: u32, buf: &[u8]) -> Self {
        let mut request = Vec::with_capacity(wire::REQUEST_HEADER_SIZE + buf.len());
        let len = buf.len() as u32;
        wire::encode_request(&mut request, Command::Write, seq_nr, len, 0, len);
        request.extend_from_slice(buf);
        Write {
            inner: RequestReply::new(request, seq_nr),
        }
    }
}

impl OperationMachine for Write {
    type Output = u32;

    fn poll(&mut self, parts: &mut ConnectionParts<'_>, cancel: &CancellationToken) -> OpPoll<u32> {
        self.inner.poll(parts, cancel, |reply, _payload| {
            if reply.kind == Some(ReplyType::Written) {
                Some(Ok(reply.arg1))
            } else {
                None
            }
        })
    }
}
