/*!
 * Guarded File Handles
 * Pool-owned handles keyed by path and access mode
 */

mod guarded;
mod key;

pub use guarded::{GuardedHandle, HandleOps};
pub use key::{AccessFlags, HandleKey};
