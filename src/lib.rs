/*!
 * Pooled File-Handle Manager
 * Caches open OS file handles behind scoped leases for a virtual-filesystem layer
 */

pub mod cancel;
pub mod exclusion;
pub mod fs;
pub mod handle;
pub mod pool;
pub mod stream;

// Re-exports
pub use cancel::{CancelShield, CancelToken};
pub use exclusion::{
    AccessMode, ExclusionCoordinator, ExclusionError, ExclusionPolicy, ExclusionResult,
    ExclusionToken,
};
pub use fs::PooledFs;
pub use handle::{AccessFlags, GuardedHandle, HandleKey, HandleOps};
pub use pool::{EvictionObserver, HandlePool, Lease, PoolConfig, PoolError, PoolResult};
pub use stream::{PoolReader, PoolWriter};
