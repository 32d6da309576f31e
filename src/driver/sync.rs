//! The synchronous driver (C4): blocks the calling thread by repeatedly
//! polling the state machine with a backoff sleep between attempts.
//!
//! Grounded on `exfiltrate_internal::wire::write_all_robust`'s
//! `WouldBlock`-then-sleep loop: this crate's original already treats
//! "non-blocking socket reports no progress" as "sleep a fixed interval,
//! try again" rather than using a real readiness notification, and that
//! is exactly what `run_sync_state_machine` needs here too.

use crate::cancel::CancellationToken;
use crate::channel::RawChannel;
use crate::connection::Connection;
use crate::error::Error;
use crate::op::{OpPoll, OperationMachine};

/// Drives `machine` to completion against `conn`, sleeping
/// `conn.config().poll_backoff` between non-blocking attempts that made
/// no progress.
pub fn run<C: RawChannel, M: OperationMachine>(machine: &mut M, conn: &mut Connection<C>, cancel: &CancellationToken) -> Result<M::Output, Error> {
    let backoff = conn.config().poll_backoff;
    #[cfg(feature = "logwise")]
    let mut spin_guard = None;
    loop {
        let mut parts = conn.parts_mut();
        let step = machine.poll(&mut parts, cancel);
        match step {
            OpPoll::Ready(result) => {
                if let Err(ref e) = result {
                    #[cfg(feature = "logwise")]
                    logwise::warn_sync!("vfsstream operation finished with an error: {e}", e = e.to_string());
                    #[cfg(not(feature = "logwise"))]
                    crate::logging::log(&format!("vfsstream: operation finished with an error: {e}"));
                }
                return result;
            }
            OpPoll::Pending(_) => {
                drop(parts);
                #[cfg(feature = "logwise")]
                {
                    if spin_guard.is_none() {
                        spin_guard = Some(logwise::perfwarn_begin!("vfsstream::driver::sync::run"));
                    }
                }
                std::thread::sleep(backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockChannel;
    use crate::config::Config;
    use crate::op::close::Close;
    use crate::op::write::Write;
    use crate::wire::{self, Command, ReplyType};
    use std::time::Duration;

    fn fast_config() -> Config {
        Config {
            poll_backoff: Duration::from_micros(50),
            ..Config::default()
        }
    }

    fn written_reply(seq_nr: u32, acked: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(ReplyType::Written as u32).to_be_bytes());
        buf.extend_from_slice(&seq_nr.to_be_bytes());
        buf.extend_from_slice(&acked.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf
    }

    fn closed_reply(seq_nr: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(ReplyType::Closed as u32).to_be_bytes());
        buf.extend_from_slice(&seq_nr.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf
    }

    fn cancelled_reply(seq_nr: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(ReplyType::Cancelled as u32).to_be_bytes());
        buf.extend_from_slice(&seq_nr.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf
    }

    #[test]
    fn write_completes_when_reply_already_queued() {
        let mut conn = Connection::new(MockChannel::new(), fast_config());
        let seq = conn.alloc_seq_nr();
        let mut machine = Write::new(seq, b"abc");
        conn.channel_mut().push_inbound(&written_reply(seq, 3));

        let cancel = CancellationToken::never();
        let result = run(&mut machine, &mut conn, &cancel).unwrap();
        assert_eq!(result, 3);
        assert_eq!(conn.channel_mut().outbound.len(), wire::REQUEST_HEADER_SIZE + 3);
    }

    #[test]
    fn write_partial_ack_is_returned_verbatim() {
        let mut conn = Connection::new(MockChannel::new(), fast_config());
        let seq = conn.alloc_seq_nr();
        let mut machine = Write::new(seq, &[0u8; 1024]);
        conn.channel_mut().push_inbound(&written_reply(seq, 2));

        let cancel = CancellationToken::never();
        let result = run(&mut machine, &mut conn, &cancel).unwrap();
        assert_eq!(result, 2);
    }

    #[test]
    fn close_completes_after_matching_reply() {
        let mut conn = Connection::new(MockChannel::new(), fast_config());
        let seq = conn.alloc_seq_nr();
        let mut machine = Close::new(seq);
        conn.channel_mut().push_inbound(&closed_reply(seq));

        let cancel = CancellationToken::never();
        assert!(run(&mut machine, &mut conn, &cancel).is_ok());
    }

    #[test]
    fn stray_reply_for_a_different_seq_nr_is_ignored() {
        let mut conn = Connection::new(MockChannel::new(), fast_config());
        let seq = conn.alloc_seq_nr();
        let mut machine = Write::new(seq, b"abc");
        conn.channel_mut().push_inbound(&written_reply(seq + 41, 3));
        conn.channel_mut().push_inbound(&written_reply(seq, 3));

        let cancel = CancellationToken::never();
        let result = run(&mut machine, &mut conn, &cancel).unwrap();
        assert_eq!(result, 3);
    }

    #[test]
    fn cancel_before_request_sent_aborts_with_no_wire_traffic() {
        let mut conn = Connection::new(MockChannel::new(), fast_config());
        let seq = conn.alloc_seq_nr();
        let mut machine = Write::new(seq, b"abc");

        let (source, cancel) = crate::cancel::channel();
        source.cancel();

        let result = run(&mut machine, &mut conn, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(conn.channel_mut().outbound.is_empty());
    }

    #[test]
    fn cancel_after_request_sent_emits_exactly_one_cancel_frame() {
        let mut conn = Connection::new(MockChannel::new(), fast_config());
        let seq = conn.alloc_seq_nr();
        let mut machine = Write::new(seq, &[0u8; 1024]);
        let (source, cancel) = crate::cancel::channel();

        // First poll drains the request in full (the mock channel never
        // reports partial writes unless a chunk_limit is set) and then
        // finds no reply yet.
        {
            let mut parts = conn.parts_mut();
            assert!(matches!(machine.poll(&mut parts, &cancel), OpPoll::Pending(_)));
        }
        let sent_before_cancel = conn.channel_mut().outbound.len();
        assert_eq!(sent_before_cancel, wire::REQUEST_HEADER_SIZE + 1024);

        source.cancel();
        {
            let mut parts = conn.parts_mut();
            assert!(matches!(machine.poll(&mut parts, &cancel), OpPoll::Pending(_)));
        }
        let cancel_frame = &conn.channel_mut().outbound[sent_before_cancel..];
        assert_eq!(cancel_frame.len(), wire::REQUEST_HEADER_SIZE);
        assert_eq!(u32::from_be_bytes(cancel_frame[0..4].try_into().unwrap()), Command::Cancel as u32);
        // The CANCEL frame gets its own fresh seq_nr (the next one after the
        // write's) and carries the write's seq_nr in arg1.
        assert_eq!(u32::from_be_bytes(cancel_frame[4..8].try_into().unwrap()), seq + 1);
        assert_eq!(u32::from_be_bytes(cancel_frame[8..12].try_into().unwrap()), seq);

        // Polling again before any reply arrives must not emit a second
        // CANCEL frame.
        {
            let mut parts = conn.parts_mut();
            assert!(matches!(machine.poll(&mut parts, &cancel), OpPoll::Pending(_)));
        }
        assert_eq!(conn.channel_mut().outbound.len(), sent_before_cancel + wire::REQUEST_HEADER_SIZE);

        conn.channel_mut().push_inbound(&cancelled_reply(seq));
        let result = run(&mut machine, &mut conn, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn reply_of_the_wrong_type_for_the_same_seq_nr_is_ignored() {
        let mut conn = Connection::new(MockChannel::new(), fast_config());
        let seq = conn.alloc_seq_nr();
        let mut machine = Write::new(seq, b"abc");
        // A CLOSED reply sharing this op's seq_nr (e.g. a stale frame from a
        // previous use of the number) is not a WRITTEN reply and must be
        // skipped, not mistaken for this write's completion.
        conn.channel_mut().push_inbound(&closed_reply(seq));
        conn.channel_mut().push_inbound(&written_reply(seq, 3));

        let cancel = CancellationToken::never();
        let result = run(&mut machine, &mut conn, &cancel).unwrap();
        assert_eq!(result, 3);
    }

    #[test]
    fn cancel_mid_write_surfaces_the_remote_error_the_peer_sent_back() {
        let mut conn = Connection::new(MockChannel::new(), fast_config());
        let seq = conn.alloc_seq_nr();
        let mut machine = Write::new(seq, &[0u8; 1024]);
        let (source, cancel) = crate::cancel::channel();

        {
            let mut parts = conn.parts_mut();
            assert!(matches!(machine.poll(&mut parts, &cancel), OpPoll::Pending(_)));
        }
        source.cancel();

        let payload = b"org.test\0cancelled\0";
        let mut error_reply = Vec::new();
        error_reply.extend_from_slice(&(ReplyType::Error as u32).to_be_bytes());
        error_reply.extend_from_slice(&seq.to_be_bytes());
        error_reply.extend_from_slice(&5u32.to_be_bytes());
        error_reply.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        error_reply.extend_from_slice(payload);
        conn.channel_mut().push_inbound(&error_reply);

        match run(&mut machine, &mut conn, &cancel) {
            Err(Error::Remote(r)) => {
                assert_eq!(r.domain, "org.test");
                assert_eq!(r.code, 5);
                assert_eq!(r.message, "cancelled");
            }
            other => panic!("expected a remote error, got {other:?}"),
        }
    }

    #[test]
    fn write_completes_even_when_the_channel_only_ever_moves_one_byte_at_a_time() {
        let mut conn = Connection::new(MockChannel::new(), fast_config());
        conn.channel_mut().chunk_limit = Some(1);
        let seq = conn.alloc_seq_nr();
        let mut machine = Write::new(seq, b"hello");
        conn.channel_mut().push_inbound(&written_reply(seq, 5));

        let cancel = CancellationToken::never();
        let result = run(&mut machine, &mut conn, &cancel).unwrap();
        assert_eq!(result, 5);
        assert_eq!(conn.channel_mut().outbound.len(), wire::REQUEST_HEADER_SIZE + 5);
    }
}
