/*!
 * Pooled Output Stream
 * Writes through a lease on a pooled write-mode handle
 */

use std::io::{self, Write};
use std::path::PathBuf;

use super::CloseObserver;
use crate::exclusion::ExclusionToken;
use crate::pool::Lease;

/// Byte-output stream over a pooled handle
///
/// `flush` forces data and metadata to storage. Closing releases the lease
/// first, then the exclusion token; the handle stays pooled for the next
/// writer. Dropping an unclosed writer closes it.
pub struct PoolWriter {
    lease: Lease,
    token: Option<ExclusionToken<PathBuf>>,
    on_close: Option<CloseObserver>,
    closed: bool,
}

impl PoolWriter {
    pub(crate) fn new(
        lease: Lease,
        token: Option<ExclusionToken<PathBuf>>,
        on_close: Option<CloseObserver>,
    ) -> Self {
        Self {
            lease,
            token,
            on_close,
            closed: false,
        }
    }

    /// Stream position
    pub fn position(&self) -> io::Result<u64> {
        self.lease.position().map_err(io::Error::from)
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
                log::error!("releasing write token failed: {}", e);
            }
        }
        if let Some(observer) = self.on_close.take() {
            observer();
        }
        Ok(())
    }
}

impl Write for PoolWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.lease
            .use_handle(|ops| ops.write(buf))
            .map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lease
            .use_handle(|ops| ops.sync(true))
            .map_err(io::Error::from)
    }
}

impl Drop for PoolWriter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                log::error!("closing pooled writer failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for PoolWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PoolWriter")
            .field("lease", &self.lease)
            .field("closed", &self.closed)
            .finish()
    }
}
