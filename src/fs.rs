/*!
 * Pooled Filesystem Front-End
 *
 * The surface the filesystem-object layer consumes: open a read or write
 * stream against a path, with reader/writer exclusion per logical file and
 * pooled handles underneath.
 */

use std::io;
use std::path::{Path, PathBuf};

use crate::exclusion::{AccessMode, ExclusionCoordinator, ExclusionPolicy};
use crate::handle::{AccessFlags, HandleKey};
use crate::pool::{HandlePool, PoolConfig};
use crate::stream::{PoolReader, PoolWriter};

/// Pooled stream access to OS files
///
/// Owns the handle pool and the per-path exclusion coordinator. The logical
/// identity for exclusion is the cleaned path, shared by read-mode and
/// write-mode handle keys.
pub struct PooledFs {
    pool: HandlePool,
    exclusion: ExclusionCoordinator<PathBuf>,
}

impl PooledFs {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            pool: HandlePool::new(config),
            exclusion: ExclusionCoordinator::new(),
        }
    }

    pub fn with_exclusion_policy(config: PoolConfig, policy: ExclusionPolicy) -> Self {
        Self {
            pool: HandlePool::new(config),
            exclusion: ExclusionCoordinator::with_policy(policy),
        }
    }

    /// Open a byte-input stream: read exclusion token, then a read-mode
    /// lease. Stream close releases lease then token.
    pub fn open_for_read<P: AsRef<Path>>(&self, path: P) -> io::Result<PoolReader> {
        let key = HandleKey::new(path, AccessFlags::read_only());
        let token = self
            .exclusion
            .acquire(key.path().to_path_buf(), AccessMode::Read)
            .map_err(io::Error::from)?;
        // Token auto-releases on the error path here
        let lease = self.pool.lease_key(key).map_err(io::Error::from)?;
        Ok(PoolReader::new(lease, Some(token), None))
    }

    /// Open a byte-output stream: write exclusion token, then a
    /// write-mode (create/truncate) lease. Stream close releases lease
    /// then token.
    pub fn open_for_write<P: AsRef<Path>>(&self, path: P) -> io::Result<PoolWriter> {
        let key = HandleKey::new(path, AccessFlags::write_truncate());
        let token = self
            .exclusion
            .acquire(key.path().to_path_buf(), AccessMode::Write)
            .map_err(io::Error::from)?;
        let lease = self.pool.lease_key(key).map_err(io::Error::from)?;
        // A pool hit reuses an already-open handle, so truncation must be
        // re-applied per stream, not only at open time.
        lease
            .use_handle(|ops| ops.truncate(0))
            .map_err(io::Error::from)?;
        Ok(PoolWriter::new(lease, Some(token), None))
    }

    /// Non-blocking: is a write stream outstanding for `path`?
    pub fn is_being_written<P: AsRef<Path>>(&self, path: P) -> bool {
        let key = HandleKey::new(path, AccessFlags::read_only());
        self.exclusion.is_being_written(&key.path().to_path_buf())
    }

    /// The underlying handle pool
    pub fn pool(&self) -> &HandlePool {
        &self.pool
    }

    /// Forced shutdown of the pool, closing every handle regardless of
    /// outstanding leases. Unsafe if streams are still open; meant for
    /// test/teardown code.
    pub fn close_all(&self) {
        self.pool.close();
    }
}

impl Default for PooledFs {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl std::fmt::Debug for PooledFs {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PooledFs").field("pool", &self.pool).finish()
    }
}
