//! The Skip operation: discards already-queued inbound data without
//! handing it to the caller, used when a seek lands past bytes a prior
//! Read has already requested.
//!
//! Unlike the other four kinds, Skip never puts anything on the wire — it
//! is a purely local call against the buffered data stream (matching
//! `STATE_OP_SKIP`'s `g_input_stream_skip`/`..._skip_async`, which never
//! touch `append_request`/`command_stream` at all).

use super::{OpPoll, OperationMachine, Readiness};
use crate::cancel::CancellationToken;
use crate::channel::is_would_block;
use crate::connection::ConnectionParts;
use crate::error::Error;

/// Discards up to `requested` bytes already queued on the channel's inbound
/// side and yields the number actually discarded.
pub struct Skip {
    requested: usize,
    discarded: usize,
}

impl Skip {
    pub fn new(requested: u32) -> Self {
        Skip {
            requested: requested as usize,
            discarded: 0,
        }
    }
}

impl OperationMachine for Skip {
    type Output = u32;

    fn poll(&mut self, parts: &mut ConnectionParts<'_>, cancel: &CancellationToken) -> OpPoll<u32> {
        if self.discarded == 0 && cancel.is_cancelled() {
            return OpPoll::Ready(Err(Error::Cancelled));
        }
        let remaining = self.requested - self.discarded;
        match parts.channel.try_skip(remaining) {
            Ok(n) => {
                self.discarded += n;
                if n == 0 || self.discarded >= self.requested {
                    OpPoll::Ready(Ok(self.discarded as u32))
                } else {
                    OpPoll::Pending(Readiness::Read)
                }
            }
            Err(e) if is_would_block(&e) => OpPoll::Pending(Readiness::Read),
            Err(e) => OpPoll::Ready(Err(Error::ProtocolIo(e.to_string()))),
        }
    }
}
