//! Per-operation state machines (C3).
//!
//! Each machine here is the pure logic of one request/reply exchange:
//! which bytes to put on the wire, how to interpret what comes back, and
//! when a pending CANCEL frame needs to be emitted. A machine never
//! touches a channel directly — it only sees the borrowed
//! [`crate::connection::ConnectionParts`] handed to it on each call to
//! [`OperationMachine::poll`], so the exact same machine runs under the
//! blocking driver ([`crate::driver::sync`]) and the cooperative async
//! driver ([`crate::driver::asynchronous`]) alike.
//!
//! This mirrors how `gfileoutputstreamdaemon.c`'s `*_state_machine`
//! functions are written against a socket-free op struct and run by either
//! `run_sync_state_machine` or an async iterator, never touching the
//! socket themselves outside of `append_request` / `decode_reply`.

pub mod close;
pub mod read;
pub mod seek;
pub mod skip;
pub mod write;

use crate::cancel::CancellationToken;
use crate::channel::is_would_block;
use crate::connection::ConnectionParts;
use crate::error::Error;
use crate::wire::{self, Command, Reply};

/// What a machine is waiting on when it isn't done yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// More of the outbound request still needs to be written.
    Write,
    /// More of the inbound reply still needs to arrive.
    Read,
}

/// The result of one [`OperationMachine::poll`] call.
pub enum OpPoll<T> {
    /// Not finished; a driver should retry once `hint` looks satisfiable
    /// (the sync driver just backs off and retries regardless of hint).
    Pending(Readiness),
    /// Finished, successfully or not. The machine must not be polled again.
    Ready(Result<T, Error>),
}

/// Shared interface every per-operation state machine implements.
pub trait OperationMachine {
    /// What the operation yields on success (e.g. bytes written, or the
    /// new stream offset).
    type Output;

    /// Advances the state machine by attempting at most one non-blocking
    /// I/O action against `parts.channel`. Must be callable repeatedly
    /// (including immediately after a `Pending` result) until it returns
    /// `Ready`.
    fn poll(&mut self, parts: &mut ConnectionParts<'_>, cancel: &CancellationToken) -> OpPoll<Self::Output>;
}

/// Drains `buf[*written..]` onto `channel`, returning `Ok(true)` once
/// fully flushed. Shared by the S0/S1/S2 write states and by the CANCEL
/// frame's own send.
fn drive_write(channel: &mut dyn crate::channel::RawChannel, buf: &[u8], written: &mut usize) -> Result<bool, Error> {
    if *written >= buf.len() {
        return Ok(true);
    }
    match channel.try_write(&buf[*written..]) {
        Ok(0) => Ok(false),
        Ok(n) => {
            *written += n;
            Ok(*written >= buf.len())
        }
        Err(e) if is_would_block(&e) => Ok(false),
        Err(e) => Err(Error::ProtocolIo(e.to_string())),
    }
}

/// Accumulates bytes into `inbound` until one full reply frame (header
/// plus any ERROR payload) is present, then drains and returns it.
/// `Ok(None)` means the caller should retry after the channel is next
/// readable.
fn drive_read_reply(channel: &mut dyn crate::channel::RawChannel, inbound: &mut Vec<u8>) -> Result<Option<(Reply, Vec<u8>)>, Error> {
    let missing = wire::reply_missing_bytes(inbound);
    if missing > 0 {
        let mut scratch = vec![0u8; missing];
        match channel.try_read(&mut scratch) {
            Ok(0) => {
                #[cfg(feature = "logwise")]
                logwise::error_sync!("vfsstream channel closed mid-frame");
                #[cfg(not(feature = "logwise"))]
                crate::logging::log("vfsstream: channel closed mid-frame");
                return Err(Error::ProtocolIo("channel closed mid-frame".into()));
            }
            Ok(n) => inbound.extend_from_slice(&scratch[..n]),
            Err(e) if is_would_block(&e) => return Ok(None),
            Err(e) => {
                #[cfg(feature = "logwise")]
                logwise::error_sync!("vfsstream channel read failed: {e}", e = e.to_string());
                #[cfg(not(feature = "logwise"))]
                crate::logging::log(&format!("vfsstream: channel read failed: {e}"));
                return Err(Error::ProtocolIo(e.to_string()));
            }
        }
        if wire::reply_missing_bytes(inbound) > 0 {
            return Ok(None);
        }
    }
    let (reply, payload) = wire::decode_reply(inbound);
    let payload = payload.to_vec();
    let frame_len = wire::REPLY_HEADER_SIZE + payload.len();
    inbound.drain(..frame_len);
    Ok(Some((reply, payload)))
}

fn reply_matches(reply: &Reply, expected_seq_nr: u32) -> bool {
    reply.seq_nr == expected_seq_nr
}

/// Turns a completed reply into `Some(Err)` if it is an ERROR or an
/// unexpected CANCELLED, leaving interpretation of "good" reply types to
/// the per-kind `interpret` closure.
fn reply_to_error(reply: &Reply, payload: &[u8]) -> Option<Error> {
    use crate::wire::ReplyType;
    match reply.kind {
        Some(ReplyType::Error) => Some(wire::decode_error(reply, payload)),
        Some(ReplyType::Cancelled) => Some(Error::Cancelled),
        None => Some(Error::ProtocolIo(format!("unrecognized reply type {}", reply.raw_type))),
        _ => None,
    }
}

enum Phase {
    SendRequest(usize),
    AwaitReply,
    SendCancel(usize),
}

/// The S0/S1/S2/S3 machinery common to every operation kind: send one
/// request frame (with optional payload already appended), then await the
/// matching reply, emitting a single CANCEL frame the first time
/// cancellation becomes visible while waiting.
///
/// Per-kind machines ([`write::Write`], [`read::Read`], ...) hold one of
/// these plus a closure-like `interpret` step for their own success reply.
pub(crate) struct RequestReply {
    request: Vec<u8>,
    cancel_request: Vec<u8>,
    seq_nr: u32,
    phase: Phase,
}

impl RequestReply {
    /// `request` must already contain the full frame this operation sends
    /// (header plus payload, if any); `seq_nr` is the number it was
    /// encoded with.
    pub(crate) fn new(request: Vec<u8>, seq_nr: u32) -> Self {
        RequestReply {
            request,
            cancel_request: Vec::new(),
            seq_nr,
            phase: Phase::SendRequest(0),
        }
    }

    /// Drives the shared machinery one step. `interpret` is called once
    /// per reply whose `seq_nr` matches this operation; returning `None`
    /// means "not my success type, keep waiting" (S3's discard-and-loop
    /// branch), matching e.g. a Write op that happens to see stray frames
    /// of an unrelated type.
    pub(crate) fn poll<T>(
        &mut self,
        parts: &mut ConnectionParts<'_>,
        cancel: &CancellationToken,
        interpret: impl Fn(&Reply, &[u8]) -> Option<Result<T, Error>>,
    ) -> OpPoll<T> {
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
                        #[cfg(feature = "logwise")]
                        logwise::info_sync!("vfsstream emitting CANCEL for seq_nr {seq}", seq = self.seq_nr);
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
                            match interpret(&reply, &payload) {
                                Some(result) => return OpPoll::Ready(result),
                                None => continue,
                            }
                        }
                        Ok(None) => return OpPoll::Pending(Readiness::Read),
                        Err(e) => return OpPoll::Ready(Err(e)),
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
