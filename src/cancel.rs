//! The cancellation signal (C6): a sharable flag the engine polls, plus an
//! optional wakeup invoked the moment it flips.
//!
//! The flag itself uses the same `AtomicBool` + `Ordering::Acquire/Release`
//! discipline as [`crate::Spinlock`]-style primitives in the crate this
//! engine grew out of, but holds no data behind the flag — there is nothing
//! here to spin-wait on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct Inner {
    flag: AtomicBool,
    wakeup: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

/// A cloneable handle observing one cancellation flag.
///
/// Cloning shares the same flag: flipping it through any clone is visible
/// to all others. This is the handle threaded through the drivers and
/// state machines; [`CancellationSource`] is the handle that flips it.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

/// The owning side of a cancellation signal. Typically held by whatever
/// initiated the operation (or composes a timeout on top of it, per the
/// engine's non-goal of not implementing timeouts itself).
pub struct CancellationSource {
    inner: Arc<Inner>,
}

/// Creates a fresh, not-yet-cancelled signal and its source.
pub fn channel() -> (CancellationSource, CancellationToken) {
    let inner = Arc::new(Inner {
        flag: AtomicBool::new(false),
        wakeup: Mutex::new(None),
    });
    (
        CancellationSource { inner: inner.clone() },
        CancellationToken { inner },
    )
}

impl CancellationToken {
    /// A token that can never be cancelled, for callers with no
    /// cancellation story of their own.
    pub fn never() -> Self {
        channel().1
    }

    /// Polled by the state machines at every well-defined cancellation
    /// point (see the engine's S1/S3 states).
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Registers a callback invoked (at most once) the moment the signal
    /// is flipped. Used by the async driver to wake its owning event loop;
    /// the sync driver has no use for it and simply polls.
    ///
    /// Replaces any previously registered wakeup.
    pub fn on_cancel<F: Fn() + Send + Sync + 'static>(&self, wakeup: F) {
        *self.inner.wakeup.lock().unwrap() = Some(Box::new(wakeup));
    }
}

impl CancellationSource {
    /// Flips the flag and fires the registered wakeup, if any.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::Release);
        if let Some(wakeup) = self.inner.wakeup.lock().unwrap().as_ref() {
            wakeup();
        }
    }

    /// A token observing this source's flag.
    pub fn token(&self) -> CancellationToken {
        CancellationToken { inner: self.inner.clone() }
    }
}
