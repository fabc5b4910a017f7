/*!
 * Leases
 *
 * A lease is the only way application code touches a pooled handle. Several
 * leases may share one handle; each keeps its own logical cursor, which
 * `use_handle` installs before running the caller's operation and refreshes
 * afterward. The handle's lock is held for the whole operation, so a lease's
 * multi-step work observes a consistent cursor.
 */

use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::entry::PoolEntry;
use super::{PoolError, PoolResult};
use crate::handle::{HandleKey, HandleOps};

/// Scoped token granting access to one pooled handle
///
/// Reference-counts against its pool entry: created counted, released on
/// [`Self::release`] or drop, never on access. A released lease can never be
/// used again; every access fails with [`PoolError::LeaseClosed`].
pub struct Lease {
    entry: Arc<PoolEntry>,
    /// This lease's logical cursor into the shared handle
    position: Mutex<u64>,
    open: AtomicBool,
}

impl Lease {
    /// The pool has already incremented the entry's lease-count.
    pub(crate) fn new(entry: Arc<PoolEntry>) -> Self {
        Self {
            entry,
            position: Mutex::new(0),
            open: AtomicBool::new(true),
        }
    }

    #[inline]
    pub fn key(&self) -> &HandleKey {
        self.entry.key()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Run `op` against the underlying handle with this lease's cursor
    /// installed, then record the cursor the operation left behind.
    pub fn use_handle<R, F>(&self, op: F) -> PoolResult<R>
    where
        F: FnOnce(&mut HandleOps<'_>) -> io::Result<R>,
    {
        if !self.is_open() {
            return Err(PoolError::LeaseClosed);
        }
        let mut position = self.position.lock();
        let mut ops = self.entry.handle().lock();
        ops.restore_position(*position);
        let result = op(&mut ops);
        *position = ops.position();
        drop(ops);
        result.map_err(PoolError::from)
    }

    /// This lease's cursor
    pub fn position(&self) -> PoolResult<u64> {
        if !self.is_open() {
            return Err(PoolError::LeaseClosed);
        }
        Ok(*self.position.lock())
    }

    /// Move this lease's cursor; applied to the handle on the next use
    pub fn set_position(&self, pos: u64) -> PoolResult<()> {
        if !self.is_open() {
            return Err(PoolError::LeaseClosed);
        }
        *self.position.lock() = pos;
        Ok(())
    }

    /// Return the handle to the pool. Idempotent; also runs on drop.
    pub fn release(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.entry.release();
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Lease")
            .field("key", self.key())
            .field("open", &self.is_open())
            .finish()
    }
}

impl fmt::Display for Lease {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Lease({}, {})",
            self.key(),
            if self.is_open() { "open" } else { "released" }
        )
    }
}
