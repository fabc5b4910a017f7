/*!
 * Cooperative Cancellation
 *
 * Per-thread cancellation signal with a scoped shield for blocking calls.
 *
 * A thread hands out a [`CancelToken`] so other threads can request that it
 * stop what it is doing. Code about to enter a blocking I/O call engages a
 * [`CancelShield`], which captures-and-clears any pending request and
 * re-raises it when the shield is dropped. The blocking call itself never
 * observes the request, but the caller's own cancellation handling still
 * does once the call has committed.
 */

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

thread_local! {
    static FLAG: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
}

/// Handle to one thread's cancellation flag
///
/// Cloneable and `Send`; any holder may request cancellation of the thread
/// that created it. The flag outlives the thread, so late requests are
/// harmless no-ops.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Token for the calling thread
    pub fn for_current() -> Self {
        Self {
            flag: FLAG.with(Arc::clone),
        }
    }

    /// Request cancellation of the owning thread
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check whether a request is pending (without consuming it)
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Check the calling thread's pending request without consuming it
pub fn is_requested() -> bool {
    FLAG.with(|f| f.load(Ordering::SeqCst))
}

/// Consume and return the calling thread's pending request
pub fn take_requested() -> bool {
    FLAG.with(|f| f.swap(false, Ordering::SeqCst))
}

fn raise() {
    FLAG.with(|f| f.store(true, Ordering::SeqCst));
}

/// Scoped shield around a blocking call
///
/// Captures-and-clears the calling thread's pending cancellation request on
/// entry and restores it on drop, on every exit path. A request arriving
/// *while* the shield is engaged is not cleared; it stays visible after the
/// shielded section.
///
/// Not `Send`: the restore must happen on the thread that engaged it.
pub struct CancelShield {
    was_requested: bool,
    _not_send: PhantomData<*const ()>,
}

impl CancelShield {
    /// Capture and clear the calling thread's pending request
    pub fn engage() -> Self {
        Self {
            was_requested: take_requested(),
            _not_send: PhantomData,
        }
    }
}

impl Drop for CancelShield {
    fn drop(&mut self) {
        if self.was_requested {
            raise();
        }
    }
}
