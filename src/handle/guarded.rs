/*!
 * Guarded Handle
 *
 * Wraps one raw OS file handle so it cannot be closed except by its owning
 * pool, and so a cancellation request arriving around a blocking call cannot
 * leave the handle's cursor in an indeterminate state.
 *
 * The handle keeps its own `safe_position` cursor: it always equals the sum
 * of committed transfers and explicit seeks, and every transfer re-seeks the
 * native cursor from it first. The native cursor is never trusted between
 * operations, which is also what lets several leases share one handle, each
 * restoring its expected position on entry.
 */

use parking_lot::{Mutex, MutexGuard};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use super::key::HandleKey;
use crate::cancel::CancelShield;

/// Pool-owned file handle
///
/// Shared by all leases with the same key. Destroyed only by the pool's
/// eviction sweep or forced shutdown, never by a lease.
pub struct GuardedHandle {
    key: HandleKey,
    inner: Mutex<HandleInner>,
}

struct HandleInner {
    /// `None` after the pool has closed the underlying handle
    file: Option<File>,
    safe_position: u64,
}

impl GuardedHandle {
    /// Open the underlying file for `key`
    pub(crate) fn open(key: HandleKey) -> io::Result<Self> {
        let file = key.flags().open(key.path())?;
        Ok(Self {
            key,
            inner: Mutex::new(HandleInner {
                file: Some(file),
                safe_position: 0,
            }),
        })
    }

    #[inline]
    pub fn key(&self) -> &HandleKey {
        &self.key
    }

    /// The tracked cursor, not necessarily the raw native one
    pub fn position(&self) -> u64 {
        self.inner.lock().safe_position
    }

    /// Always rejected: pooled handles are closed by the pool alone
    pub fn close(&self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "this handle is managed by a handle pool - do not close it directly",
        ))
    }

    /// Exclusive operation session; linearizes all I/O on this handle
    pub(crate) fn lock(&self) -> HandleOps<'_> {
        HandleOps {
            inner: self.inner.lock(),
        }
    }

    /// The real close, callable only by the pool. Idempotent.
    pub(crate) fn close_underlying(&self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        drop(inner.file.take());
        Ok(())
    }

    /// Whether the pool has already closed the underlying handle
    pub fn is_closed(&self) -> bool {
        self.inner.lock().file.is_none()
    }
}

impl std::fmt::Debug for GuardedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("GuardedHandle")
            .field("key", &self.key)
            .field("position", &self.position())
            .finish()
    }
}

/// Locked operation view over a guarded handle
///
/// Obtained through [`crate::pool::Lease::use_handle`]. Holding it excludes
/// every other lease on the same handle, so a multi-step operation observes
/// a consistent cursor throughout. Each blocking call is wrapped in a
/// [`CancelShield`].
pub struct HandleOps<'a> {
    inner: MutexGuard<'a, HandleInner>,
}

fn closed_err() -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        "handle has been closed by its pool",
    )
}

impl HandleOps<'_> {
    /// Tracked cursor
    #[inline]
    pub fn position(&self) -> u64 {
        self.inner.safe_position
    }

    /// Seek the native cursor and the tracked cursor to `pos`
    pub fn set_position(&mut self, pos: u64) -> io::Result<()> {
        let _shield = CancelShield::engage();
        self.inner
            .file
            .as_mut()
            .ok_or_else(closed_err)?
            .seek(SeekFrom::Start(pos))?;
        self.inner.safe_position = pos;
        Ok(())
    }

    /// Used by leases to re-install their expected cursor on entry.
    /// No syscall: transfers re-seek from the tracked cursor anyway.
    pub(crate) fn restore_position(&mut self, pos: u64) {
        self.inner.safe_position = pos;
    }

    /// Read at the tracked cursor, advancing it by the bytes read
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _shield = CancelShield::engage();
        let pos = self.inner.safe_position;
        let n = {
            let file = self.inner.file.as_mut().ok_or_else(closed_err)?;
            file.seek(SeekFrom::Start(pos))?;
            file.read(buf)?
        };
        self.inner.safe_position += n as u64;
        Ok(n)
    }

    /// Write at the tracked cursor, advancing it by the bytes written
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _shield = CancelShield::engage();
        let pos = self.inner.safe_position;
        let n = {
            let file = self.inner.file.as_mut().ok_or_else(closed_err)?;
            file.seek(SeekFrom::Start(pos))?;
            file.write(buf)?
        };
        self.inner.safe_position += n as u64;
        Ok(n)
    }

    /// Positional read. Advances the tracked cursor by the bytes moved,
    /// like every other transfer.
    pub fn read_at(&mut self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        let _shield = CancelShield::engage();
        let n = {
            let file = self.inner.file.as_mut().ok_or_else(closed_err)?;
            file.seek(SeekFrom::Start(pos))?;
            file.read(buf)?
        };
        self.inner.safe_position += n as u64;
        Ok(n)
    }

    /// Positional write; cursor accounting as in [`Self::read_at`]
    pub fn write_at(&mut self, buf: &[u8], pos: u64) -> io::Result<usize> {
        let _shield = CancelShield::engage();
        let n = {
            let file = self.inner.file.as_mut().ok_or_else(closed_err)?;
            file.seek(SeekFrom::Start(pos))?;
            file.write(buf)?
        };
        self.inner.safe_position += n as u64;
        Ok(n)
    }

    /// Current file size
    pub fn size(&mut self) -> io::Result<u64> {
        let _shield = CancelShield::engage();
        let file = self.inner.file.as_mut().ok_or_else(closed_err)?;
        Ok(file.metadata()?.len())
    }

    /// Truncate the file, clamping the tracked cursor to the new length
    pub fn truncate(&mut self, size: u64) -> io::Result<()> {
        let _shield = CancelShield::engage();
        self.inner
            .file
            .as_mut()
            .ok_or_else(closed_err)?
            .set_len(size)?;
        if self.inner.safe_position > size {
            self.inner.safe_position = size;
        }
        Ok(())
    }

    /// Force written data to storage; `metadata` includes file metadata
    pub fn sync(&mut self, metadata: bool) -> io::Result<()> {
        let _shield = CancelShield::engage();
        let file = self.inner.file.as_mut().ok_or_else(closed_err)?;
        if metadata {
            file.sync_all()
        } else {
            file.sync_data()
        }
    }
}
