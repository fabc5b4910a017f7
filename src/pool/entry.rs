/*!
 * Pool Entries
 * One pooled handle plus its lease accounting
 */

use parking_lot::{Mutex, MutexGuard};
use std::time::Instant;

use crate::handle::{GuardedHandle, HandleKey};

/// A pooled handle with its lease-count and idle stamp
///
/// The state lock is the synchronization point between lease grants and the
/// eviction sweep: an entry is never evicted while `leases > 0`, and never
/// leased once `evicted` is set.
pub(crate) struct PoolEntry {
    handle: GuardedHandle,
    state: Mutex<EntryState>,
}

pub(crate) struct EntryState {
    pub leases: usize,
    /// When the lease-count last dropped to zero
    pub idle_since: Instant,
    pub evicted: bool,
}

impl PoolEntry {
    pub fn new(handle: GuardedHandle) -> Self {
        Self {
            handle,
            state: Mutex::new(EntryState {
                leases: 0,
                idle_since: Instant::now(),
                evicted: false,
            }),
        }
    }

    #[inline]
    pub fn handle(&self) -> &GuardedHandle {
        &self.handle
    }

    #[inline]
    pub fn key(&self) -> &HandleKey {
        self.handle.key()
    }

    pub fn state(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock()
    }

    /// Grant a lease unless the entry is mid-eviction
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.evicted {
            return false;
        }
        state.leases += 1;
        true
    }

    /// Return a lease; stamps the idle clock when the count reaches zero
    pub fn release(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.leases > 0, "lease-count underflow");
        state.leases = state.leases.saturating_sub(1);
        if state.leases == 0 {
            state.idle_since = Instant::now();
        }
    }

    pub fn lease_count(&self) -> usize {
        self.state.lock().leases
    }
}
