//! The Close operation's state machine. Shared by the input- and
//! output-stream facades.

use super::{OpPoll, OperationMachine, RequestReply};
use crate::cancel::CancellationToken;
use crate::connection::ConnectionParts;
use crate::error::Error;
use crate::wire::{self, Command, ReplyType};

/// Sends a CLOSE request with no payload and yields `()` on success.
pub struct Close {
    inner: RequestReply,
}

impl Close {
    pub fn new(seq_nr: u32) -> Self {
        let mut request = Vec::with_capacity(wire::REQUEST_HEADER_SIZE);
        wire::encode_request(&mut request, Command::Close, seq_nr, 0, 0, 0);
        Close {
            inner: RequestReply::new(request, seq_nr),
        }
    }
}

impl OperationMachine for Close {
    type Output = ();

    fn poll(&mut self, parts: &mut ConnectionParts<'_>, cancel: &CancellationToken) -> OpPoll<()> {
        self.inner.poll(parts, cancel, |reply, _payload| {
            if reply.kind == Some(ReplyType::Closed) {
                Some(Ok(()))
            } else {
                None
            }
        })
    }
}
