//! The wire codec (C1): pure encode/decode of the request and reply frames.
//!
//! No I/O happens here — callers hand this module byte buffers and get
//! back frames, or hand it fields and get back bytes appended to a buffer.
//! This mirrors how `exfiltrate_internal::wire` keeps its length-prefix
//! framing (`pop_msg`, `expected_length`) free of any socket access.

use crate::error::{Error, RemoteError};

/// Size in bytes of one request frame header (excludes `data_len` payload).
pub const REQUEST_HEADER_SIZE: usize = 20;
/// Size in bytes of one reply frame header (excludes any ERROR payload).
pub const REPLY_HEADER_SIZE: usize = 16;

/// Command codes recognized by this side of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    Write = 1,
    Close = 2,
    SeekSet = 3,
    SeekCur = 4,
    SeekEnd = 5,
    Cancel = 6,
    Read = 7,
}

/// Reply codes recognized by this side of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ReplyType {
    Written = 100,
    Closed = 101,
    SeekPos = 102,
    Data = 103,
    Error = 105,
    Cancelled = 106,
}

impl ReplyType {
    fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            100 => ReplyType::Written,
            101 => ReplyType::Closed,
            102 => ReplyType::SeekPos,
            103 => ReplyType::Data,
            105 => ReplyType::Error,
            106 => ReplyType::Cancelled,
            _ => return None,
        })
    }
}

/// A decoded reply header. The raw `type` word is kept alongside the
/// parsed [`ReplyType`] so an unrecognized code can still be reported
/// (and discarded per the reply-filtering invariant) instead of panicking.
#[derive(Debug, Clone, Copy)]
pub struct Reply {
    pub raw_type: u32,
    pub kind: Option<ReplyType>,
    pub seq_nr: u32,
    pub arg1: u32,
    pub arg2: u32,
}

/// Appends one request frame to `buf` and returns the sequence number it
/// was assigned. `seq_nr` is supplied by the caller (the connection owns
/// the counter, per the invariant that CANCEL does not consume a fresh one).
pub fn encode_request(buf: &mut Vec<u8>, command: Command, seq_nr: u32, arg1: u32, arg2: u32, data_len: u32) {
    buf.extend_from_slice(&(command as u32).to_be_bytes());
    buf.extend_from_slice(&seq_nr.to_be_bytes());
    buf.extend_from_slice(&arg1.to_be_bytes());
    buf.extend_from_slice(&arg2.to_be_bytes());
    buf.extend_from_slice(&data_len.to_be_bytes());
}

/// Returns how many more bytes must arrive in `buf` before a complete
/// reply frame (header plus any ERROR payload) is present. Zero means
/// `buf` already holds a complete frame at its head.
pub fn reply_missing_bytes(buf: &[u8]) -> usize {
    if buf.len() < REPLY_HEADER_SIZE {
        return REPLY_HEADER_SIZE - buf.len();
    }
    let raw_type = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    if raw_type == ReplyType::Error as u32 {
        let arg2 = u32::from_be_bytes(buf[12..16].try_into().unwrap()) as usize;
        let total = REPLY_HEADER_SIZE + arg2;
        return total.saturating_sub(buf.len());
    }
    0
}

/// Parses the reply header at the head of `buf`. Returns the reply and the
/// slice immediately following the header (the ERROR payload, if any, else
/// whatever trailing bytes happen to be buffered). Caller must first have
/// ensured `reply_missing_bytes(buf) == 0`.
pub fn decode_reply(buf: &[u8]) -> (Reply, &[u8]) {
    let raw_type = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    let seq_nr = u32::from_be_bytes(buf[4..8].try_into().unwrap());
    let arg1 = u32::from_be_bytes(buf[8..12].try_into().unwrap());
    let arg2 = u32::from_be_bytes(buf[12..16].try_into().unwrap());
    let reply = Reply {
        raw_type,
        kind: ReplyType::from_u32(raw_type),
        seq_nr,
        arg1,
        arg2,
    };
    (reply, &buf[REPLY_HEADER_SIZE..])
}

/// Splits an ERROR reply's payload into `(domain, code, message)`.
///
/// The payload is `<domain>\0<message>\0`; `reply.arg1` carries the
/// domain-specific numeric code.
pub fn decode_error(reply: &Reply, payload: &[u8]) -> Error {
    let nul = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    let domain = String::from_utf8_lossy(&payload[..nul]).into_owned();
    let rest = if nul < payload.len() { &payload[nul + 1..] } else { &[][..] };
    let msg_end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    let message = String::from_utf8_lossy(&rest[..msg_end]).into_owned();
    Error::Remote(RemoteError {
        domain,
        code: reply.arg1,
        message,
    })
}
