//! The asynchronous driver (C5): the same per-operation state machines,
//! advanced one non-blocking step at a time by whatever owns the event
//! loop, instead of blocking a thread.
//!
//! This crate does not ship a reactor of its own — there is nothing here
//! resembling `mio` or `tokio`, matching the teacher's stack, which has
//! none either. Instead, [`AsyncOperation`] is driven the way a `GSource`
//! drives the original's async iterator: the embedder calls
//! [`AsyncOperation::poll`] again whenever it believes the channel might
//! have made progress (an fd-readiness callback, a timer tick, or simply
//! "try again"); the machine and its buffers are touched only from that
//! call, so nothing here needs locking.

use crate::cancel::CancellationToken;
use crate::channel::RawChannel;
use crate::connection::Connection;
use crate::error::Error;
use crate::op::{OpPoll, OperationMachine, Readiness};
use crate::poster::EventLoopPoster;
use std::sync::Mutex;

/// What the embedder should do after an [`AsyncOperation::poll`].
pub enum AsyncStep<T> {
    /// Still running; re-poll once `Readiness` looks satisfiable (the
    /// embedder's own backoff/readiness policy decides when).
    Pending(Readiness),
    /// Finished. The operation must not be polled again.
    Done(Result<T, Error>),
}

/// One in-flight operation driven cooperatively on a single thread.
pub struct AsyncOperation<M: OperationMachine> {
    machine: M,
    done: bool,
}

impl<M: OperationMachine> AsyncOperation<M> {
    pub fn new(machine: M) -> Self {
        AsyncOperation { machine, done: false }
    }

    /// Advances the operation by at most one non-blocking I/O attempt.
    ///
    /// # Panics
    /// Panics if called again after a previous call returned
    /// [`AsyncStep::Done`] — mirrors the "at most one pending operation"
    /// invariant the facade otherwise enforces.
    pub fn poll<C: RawChannel>(&mut self, conn: &mut Connection<C>, cancel: &CancellationToken) -> AsyncStep<M::Output> {
        assert!(!self.done, "AsyncOperation polled again after completion");
        let mut parts = conn.parts_mut();
        match self.machine.poll(&mut parts, cancel) {
            OpPoll::Ready(result) => {
                self.done = true;
                AsyncStep::Done(result)
            }
            OpPoll::Pending(hint) => AsyncStep::Pending(hint),
        }
    }
}

/// Arranges for `poster` to run `on_wake` (once) the moment `cancel` is
/// flipped, even from a thread other than the one owning the loop — so a
/// loop that is otherwise parked on a timer or fd readiness for this
/// operation gets nudged to re-poll promptly instead of only noticing the
/// cancellation on its next already-scheduled wakeup.
pub fn wake_loop_on_cancel<P>(cancel: &CancellationToken, poster: P, on_wake: impl FnOnce() + Send + 'static)
where
    P: EventLoopPoster,
{
    let on_wake = Mutex::new(Some(on_wake));
    cancel.on_cancel(move || {
        if let Some(f) = on_wake.lock().unwrap().take() {
            poster.post(Box::new(f));
        }
    });
}
