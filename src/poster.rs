//! The event-loop posting facility the asynchronous driver (C5) needs:
//! a way to get a continuation back onto the thread that owns a stream,
//! without the driver itself knowing anything about that thread's loop.
//!
//! This plays the same role `BidirectionalProxy`'s background reader
//! thread plays in the crate this engine grew out of — work happens off
//! to the side, but the result is only ever handed back by posting a
//! boxed closure, never by touching shared state from the side thread.

/// Schedules a closure to run on whatever thread owns a stream.
///
/// Implementations must guarantee the closure runs exactly once, on the
/// owning thread, even if `post` itself is called from a different one —
/// the asynchronous driver relies on this to keep the state machine
/// single-threaded.
pub trait EventLoopPoster: Send + Sync + 'static {
    fn post(&self, callback: Box<dyn FnOnce() + Send>);
}

/// A poster that simply runs the callback immediately, inline, on
/// whatever thread calls `post`. Useful for tests and for embedders that
/// drive the async API from a single thread with no real event loop of
/// their own (the continuation still only ever runs where `post` was
/// called from, satisfying the single-owner contract trivially).
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediatePoster;

impl EventLoopPoster for ImmediatePoster {
    fn post(&self, callback: Box<dyn FnOnce() + Send>) {
        callback();
    }
}

/// A poster backed by an `mpsc` channel: `post` enqueues the closure, and
/// whatever owns the receiving end (typically the embedder's own event
/// loop, pumped on its one owning thread) drains and runs them.
pub struct ChannelPoster {
    sender: std::sync::mpsc::Sender<Box<dyn FnOnce() + Send>>,
}

impl ChannelPoster {
    pub fn new() -> (Self, std::sync::mpsc::Receiver<Box<dyn FnOnce() + Send>>) {
        let (sender, receiver) = std::sync::mpsc::channel();
        (ChannelPoster { sender }, receiver)
    }
}

impl EventLoopPoster for ChannelPoster {
    fn post(&self, callback: Box<dyn FnOnce() + Send>) {
        let _ = self.sender.send(callback);
    }
}
