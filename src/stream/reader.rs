/*!
 * Pooled Input Stream
 *
 * Reads through a lease on a pooled read-mode handle. The stream has its own
 * logical position (the lease's cursor), so two readers on one path stay
 * independent even when they share a pooled handle.
 */

use std::io::{self, Read};
use std::path::PathBuf;

use super::CloseObserver;
use crate::exclusion::ExclusionToken;
use crate::pool::Lease;

/// Byte-input stream over a pooled handle
///
/// Closing releases the lease first, then the exclusion token; the handle
/// itself stays pooled. Dropping an unclosed reader closes it.
pub struct PoolReader {
    lease: Lease,
    token: Option<ExclusionToken<PathBuf>>,
    mark: Option<u64>,
    on_close: Option<CloseObserver>,
    closed: bool,
}

impl PoolReader {
    pub(crate) fn new(
        lease: Lease,
        token: Option<ExclusionToken<PathBuf>>,
        on_close: Option<CloseObserver>,
    ) -> Self {
        Self {
            lease,
            token,
            mark: None,
            on_close,
            closed: false,
        }
    }

    /// Bytes remaining between the stream position and end of file
    pub fn available(&self) -> io::Result<u64> {
        self.lease
            .use_handle(|ops| {
                let size = ops.size()?;
                Ok(size.saturating_sub(ops.position()))
            })
            .map_err(io::Error::from)
    }

    /// Stream position
    pub fn position(&self) -> io::Result<u64> {
        self.lease.position().map_err(io::Error::from)
    }

    /// Remember the current position for a later [`Self::reset`]
    pub fn mark(&mut self) -> io::Result<()> {
        self.mark = Some(self.lease.position().map_err(io::Error::from)?);
        Ok(())
    }

    /// Rewind to the marked position
    pub fn reset(&mut self) -> io::Result<()> {
        match self.mark {
            None => Err(io::Error::new(io::ErrorKind::Other, "mark not set")),
            Some(mark) => self.lease.set_position(mark).map_err(io::Error::from),
        }
    }

    /// Advance the stream position by `n` without reading.
    ///
    /// The position may move past end of file; subsequent reads return 0.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let old = self.lease.position().map_err(io::Error::from)?;
        let new = old.saturating_add(n);
        self.lease.set_position(new).map_err(io::Error::from)?;
        Ok(new - old)
    }

    /// Release the lease, then the exclusion token. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.lease.release();
        if let Some(mut token) = self.token.take() {
            if let Err(e) = token.release() {
                log::error!("releasing read token failed: {}", e);
            }
        }
        if let Some(observer) = self.on_close.take() {
            observer();
        }
        Ok(())
    }
}

impl Read for PoolReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.lease
            .use_handle(|ops| ops.read(buf))
            .map_err(io::Error::from)
    }
}

impl Drop for PoolReader {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                log::error!("closing pooled reader failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for PoolReader {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PoolReader")
            .field("lease", &self.lease)
            .field("closed", &self.closed)
            .finish()
    }
}
