/*!
 * Handle Pool
 *
 * Owns every guarded handle, keyed by (path, access mode). Creates on miss,
 * reuses on hit, evicts idle entries on a background sweep, and notifies a
 * caller-supplied observer on eviction.
 */

use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

mod config;
mod entry;
mod lease;
mod sweep;

pub use config::{EvictionObserver, PoolConfig};
pub use lease::Lease;

use crate::handle::{AccessFlags, GuardedHandle, HandleKey};
use entry::PoolEntry;
use sweep::Sweeper;

/// Pool operation result
pub type PoolResult<T> = Result<T, PoolError>;

/// Pool and lease errors
#[derive(Debug, Error)]
pub enum PoolError {
    /// The underlying open/create failed; carries the platform error
    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Operation on an already-released lease; always a caller logic error
    #[error("lease has been released")]
    LeaseClosed,

    /// The pool has been shut down
    #[error("handle pool is shut down")]
    Shutdown,

    /// I/O failure surfaced by an operation run through a lease
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<PoolError> for io::Error {
    fn from(err: PoolError) -> Self {
        let kind = match &err {
            PoolError::Io(e) => e.kind(),
            PoolError::Open { source, .. } => source.kind(),
            PoolError::LeaseClosed | PoolError::Shutdown => io::ErrorKind::Other,
        };
        match err {
            PoolError::Io(e) => e,
            other => io::Error::new(kind, other),
        }
    }
}

pub(crate) struct PoolShared {
    entries: DashMap<HandleKey, Arc<PoolEntry>, RandomState>,
    config: PoolConfig,
    shutdown: AtomicBool,
}

impl PoolShared {
    /// Evict every eligible entry: unleased, idle past the timeout.
    ///
    /// The entry's state lock is held across the eligibility re-check and
    /// the map removal, so a lease can never be granted against an entry
    /// mid-eviction and a leased entry can never be evicted.
    pub(crate) fn sweep(&self) {
        let now = Instant::now();
        let candidates: Vec<Arc<PoolEntry>> =
            self.entries.iter().map(|e| Arc::clone(e.value())).collect();

        for entry in candidates {
            let mut state = entry.state();
            if state.evicted || state.leases > 0 {
                continue;
            }
            if now.duration_since(state.idle_since) < self.config.idle_timeout {
                continue;
            }
            state.evicted = true;
            self.entries
                .remove_if(entry.key(), |_, live| Arc::ptr_eq(live, &entry));
            drop(state);
            self.evict(&entry);
        }
    }

    /// Observer callback, then the real close. Close failures are logged
    /// and the handle is considered abandoned either way.
    fn evict(&self, entry: &PoolEntry) {
        if let Some(observer) = &self.config.on_evicted {
            observer(entry.key(), entry.handle());
        }
        match entry.handle().close_underlying() {
            Ok(()) => log::debug!("evicted idle handle for {}", entry.key()),
            Err(e) => log::warn!("closing evicted handle for {} failed: {}", entry.key(), e),
        }
    }

    /// Forced shutdown: close everything regardless of lease-count
    fn drain_all(&self) {
        let entries: Vec<Arc<PoolEntry>> =
            self.entries.iter().map(|e| Arc::clone(e.value())).collect();
        self.entries.clear();

        for entry in entries {
            let mut state = entry.state();
            if state.evicted {
                continue;
            }
            state.evicted = true;
            let leases = state.leases;
            drop(state);
            if leases > 0 {
                log::warn!(
                    "force-closing {} with {} outstanding lease(s)",
                    entry.key(),
                    leases
                );
            }
            self.evict(&entry);
        }
    }
}

/// Pooled, concurrency-safe manager of guarded file handles
///
/// # Concurrency
///
/// The key map is sharded (`DashMap`); per-entry lease accounting is under
/// the entry's own lock, which also serializes grants against the sweep's
/// eviction check.
pub struct HandlePool {
    shared: Arc<PoolShared>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl HandlePool {
    pub fn new(config: PoolConfig) -> Self {
        let interval = config.effective_sweep_interval();
        let shared = Arc::new(PoolShared {
            entries: DashMap::with_hasher(RandomState::new()),
            config,
            shutdown: AtomicBool::new(false),
        });
        let sweeper = Sweeper::spawn(Arc::clone(&shared), interval);
        Self {
            shared,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Lease a handle for `(path, flags)`, opening it on a pool miss.
    ///
    /// Open failures propagate as [`PoolError::Open`]; a hit on an entry
    /// that is being evicted concurrently transparently re-creates it.
    pub fn lease<P: AsRef<Path>>(&self, path: P, flags: AccessFlags) -> PoolResult<Lease> {
        self.lease_key(HandleKey::new(path, flags))
    }

    pub(crate) fn lease_key(&self, key: HandleKey) -> PoolResult<Lease> {
        if self.shared.shutdown.load(Ordering::SeqCst) {
            return Err(PoolError::Shutdown);
        }
        loop {
            let entry = match self.shared.entries.entry(key.clone()) {
                Entry::Occupied(occupied) => Arc::clone(occupied.get()),
                Entry::Vacant(vacant) => {
                    let handle =
                        GuardedHandle::open(key.clone()).map_err(|source| PoolError::Open {
                            path: key.path().to_path_buf(),
                            source,
                        })?;
                    let entry = Arc::new(PoolEntry::new(handle));
                    vacant.insert(Arc::clone(&entry));
                    entry
                }
            };

            if entry.try_acquire() {
                return Ok(Lease::new(entry));
            }

            // Lost the race against the sweeper: drop the stale mapping if
            // it is still ours and retry with a fresh handle.
            self.shared
                .entries
                .remove_if(&key, |_, live| Arc::ptr_eq(live, &entry));
        }
    }

    /// Outstanding leases for a key; 0 if not pooled
    pub fn lease_count<P: AsRef<Path>>(&self, path: P, flags: AccessFlags) -> usize {
        self.shared
            .entries
            .get(&HandleKey::new(path, flags))
            .map(|e| e.lease_count())
            .unwrap_or(0)
    }

    /// Whether a handle is currently pooled for the key
    pub fn contains<P: AsRef<Path>>(&self, path: P, flags: AccessFlags) -> bool {
        self.shared.entries.contains_key(&HandleKey::new(path, flags))
    }

    /// Number of pooled handles
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    /// Forced shutdown: stops the sweeper and closes every handle
    /// regardless of lease-count. Unsafe with leases outstanding in the
    /// sense that their operations start failing; meant for teardown.
    /// Further `lease` calls fail with [`PoolError::Shutdown`].
    pub fn close(&self) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(mut sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
        self.shared.drain_all();
    }
}

impl Default for HandlePool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl Drop for HandlePool {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for HandlePool {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("HandlePool")
            .field("entries", &self.len())
            .field("config", &self.shared.config)
            .finish()
    }
}
