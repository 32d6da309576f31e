//! The Read operation's state machine (the input-stream analogue of
//! [`super::write::Write`]).
//!
//! Unlike the other kinds, a successful reply carries a second, separately
//! framed chunk (the `DATA` payload itself, `reply.arg1` bytes), so this
//! machine adds its own data-collection phase after the shared header
//! handling — it cannot reuse [`super::RequestReply`] as-is.

use super::{drive_read_reply, drive_write, reply_matches, reply_to_error, OpPoll, OperationMachine, Readiness};
use crate::cancel::CancellationToken;
use crate::channel::is_would_block;
use crate::connection::ConnectionParts;
use crate::error::Error;
use crate::wire::{self, Command, ReplyType};

enum Phase {
    SendRequest(usize),
    AwaitReply,
    AwaitData { needed: usize, collected: Vec<u8> },
    SendCancel(usize),
}

/// Sends a READ request for up to `requested` bytes and yields whatever
/// the peer actually delivered (may be fewer bytes, including zero at
/// end-of-stream on the remote side — that is not itself an error here).
pub struct Read {
    request: Vec<u8>,
    cancel_request: Vec<u8>,
    seq_nr: u32,
    phase: Phase,
}

impl Read {
    pub fn new(seq_nr: u32, requested: u32) -> Self {
        let mut request = Vec::with_capacity(wire::REQUEST_HEADER_SIZE);
        wire::encode_request(&mut request, Command::Read, seq_nr, requested, 0, 0);
        Read {
            request,
            cancel_request: Vec::new(),
            seq_nr,
            phase: Phase::SendRequest(0),
        }
    }
}

impl OperationMachine for Read {
    type Output = Vec<u8>;

    fn poll(&mut self, parts: &mut ConnectionParts<'_>, cancel: &CancellationToken) -> OpPoll<Vec<u8>> {
        loop {
            match &mut self.phase {
                Phase::SendRequest(written) => {
                    if *written == 0 && cancel.is_cancelled() {
                        return OpPoll::Ready(Err(Error::Cancelled));
                    }
                    match drive_write(parts.channel, &self.request, written) {
                        Ok(true) => {
                            self.phase = Phase::AwaitReply;
                            continue;
                        }
                        Ok(false) => return OpPoll::Pending(Readiness::Write),
                        Err(e) => return OpPoll::Ready(Err(e)),
                    }
                }
                Phase::AwaitReply => {
                    if cancel.is_cancelled() && self.cancel_request.is_empty() {
                        let cancel_seq_nr = parts.alloc_seq_nr();
                        wire::encode_request(&mut self.cancel_request, Command::Cancel, cancel_seq_nr, self.seq_nr, 0, 0);
                        self.phase = Phase::SendCancel(0);
                        continue;
                    }
                    match drive_read_reply(parts.channel, parts.inbound) {
                        Ok(Some((reply, payload))) => {
                            if !reply_matches(&reply, self.seq_nr) {
                                continue;
                            }
                            if let Some(err) = reply_to_error(&reply, &payload) {
                                return OpPoll::Ready(Err(err));
                            }
                            match reply.kind {
                                Some(ReplyType::Data) => {
                                    let needed = reply.arg1 as usize;
                                    if needed == 0 {
                                        return OpPoll::Ready(Ok(Vec::new()));
                                    }
                                    self.phase = Phase::AwaitData {
                                        needed,
                                        collected: Vec::with_capacity(needed),
                                    };
                                    continue;
                                }
                                _ => continue,
                            }
                        }
                        Ok(None) => return OpPoll::Pending(Readiness::Read),
                        Err(e) => return OpPoll::Ready(Err(e)),
                    }
                }
                Phase::AwaitData { needed, collected } => {
                    if !parts.inbound.is_empty() {
                        let take = (*needed - collected.len()).min(parts.inbound.len());
                        collected.extend(parts.inbound.drain(..take));
                    }
                    if collected.len() >= *needed {
                        return OpPoll::Ready(Ok(std::mem::take(collected)));
                    }
                    let mut scratch = vec![0u8; *needed - collected.len()];
                    match parts.channel.try_read(&mut scratch) {
                        Ok(0) => return OpPoll::Ready(Err(Error::ProtocolIo("channel closed mid-data".into()))),
                        Ok(n) => {
                            collected.extend_from_slice(&scratch[..n]);
                            if collected.len() >= *needed {
                                return OpPoll::Ready(Ok(std::mem::take(collected)));
                            }
                            return OpPoll::Pending(Readiness::Read);
                        }
                        Err(e) if is_would_block(&e) => return OpPoll::Pending(Readiness::Read),
                        Err(e) => return OpPoll::Ready(Err(Error::ProtocolIo(e.to_string()))),
                    }
                }
                Phase::SendCancel(written) => match drive_write(parts.channel, &self.cancel_request, written) {
                    Ok(true) => {
                        self.phase = Phase::AwaitReply;
                        continue;
                    }
                    Ok(false) => return OpPoll::Pending(Readiness::Write),
                    Err(e) => return OpPoll::Ready(Err(e)),
                },
            }
        }
    }
}
