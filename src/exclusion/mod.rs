/*!
 * Mutual Exclusion Coordinator
 *
 * Per logical-file identity, at most one writer or any number of readers.
 * Access is granted as a scoped token; the state machine per identity is
 * FREE -> READING(n) -> FREE and FREE -> WRITING -> FREE, with no
 * upgrade/downgrade path.
 */

use ahash::RandomState;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Exclusion operation result
pub type ExclusionResult<T> = Result<T, ExclusionError>;

/// Coordinator errors
#[derive(Debug, Clone, Error)]
pub enum ExclusionError {
    /// Fail-fast policy: the identity is held incompatibly
    #[error("resource is busy: incompatible access is outstanding")]
    Busy,

    /// Token released twice; a logic error, rejected rather than tolerated
    #[error("exclusion token already released")]
    AlreadyReleased,
}

impl From<ExclusionError> for io::Error {
    fn from(err: ExclusionError) -> Self {
        let kind = match err {
            ExclusionError::Busy => io::ErrorKind::WouldBlock,
            ExclusionError::AlreadyReleased => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Requested access rights for an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessMode::Read => write!(f, "read"),
            AccessMode::Write => write!(f, "write"),
        }
    }
}

/// What a conflicting request does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExclusionPolicy {
    /// Park until the identity returns to FREE
    #[default]
    Block,
    /// Return [`ExclusionError::Busy`] immediately
    Fail,
}

/// Per-identity state; FREE is represented by absence from the map
enum KeyState {
    Reading(usize),
    Writing,
}

struct CoordinatorInner<K> {
    states: Mutex<HashMap<K, KeyState, RandomState>>,
    freed: Condvar,
}

/// Reader/writer coordinator over logical-file identities
///
/// Owns the per-identity exclusion state but no handles; leases provide no
/// exclusivity among themselves, this coordinator is the only mechanism
/// that does.
pub struct ExclusionCoordinator<K>
where
    K: Eq + Hash + Clone,
{
    inner: Arc<CoordinatorInner<K>>,
    policy: ExclusionPolicy,
}

impl<K> ExclusionCoordinator<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::with_policy(ExclusionPolicy::default())
    }

    pub fn with_policy(policy: ExclusionPolicy) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                states: Mutex::new(HashMap::with_hasher(RandomState::new())),
                freed: Condvar::new(),
            }),
            policy,
        }
    }

    /// Acquire access for `key`, blocking or failing per policy
    pub fn acquire(&self, key: K, mode: AccessMode) -> ExclusionResult<ExclusionToken<K>> {
        let mut states = self.inner.states.lock();
        loop {
            if grant(&mut states, &key, mode) {
                return Ok(self.token(key, mode));
            }
            match self.policy {
                ExclusionPolicy::Fail => return Err(ExclusionError::Busy),
                ExclusionPolicy::Block => self.inner.freed.wait(&mut states),
            }
        }
    }

    /// Fail-fast acquire, regardless of the configured policy
    pub fn try_acquire(&self, key: K, mode: AccessMode) -> ExclusionResult<ExclusionToken<K>> {
        let mut states = self.inner.states.lock();
        if grant(&mut states, &key, mode) {
            Ok(self.token(key, mode))
        } else {
            Err(ExclusionError::Busy)
        }
    }

    /// Non-blocking query: is a write token outstanding for `key`?
    ///
    /// Used to suppress redundant change notifications while a write is in
    /// flight.
    pub fn is_being_written(&self, key: &K) -> bool {
        matches!(self.inner.states.lock().get(key), Some(KeyState::Writing))
    }

    /// Outstanding read tokens for `key`
    pub fn readers(&self, key: &K) -> usize {
        match self.inner.states.lock().get(key) {
            Some(KeyState::Reading(n)) => *n,
            _ => 0,
        }
    }

    fn token(&self, key: K, mode: AccessMode) -> ExclusionToken<K> {
        ExclusionToken {
            inner: Arc::clone(&self.inner),
            key,
            mode,
            released: false,
        }
    }
}

impl<K> Default for ExclusionCoordinator<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for ExclusionCoordinator<K>
where
    K: Eq + Hash + Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            policy: self.policy,
        }
    }
}

fn grant<K>(
    states: &mut HashMap<K, KeyState, RandomState>,
    key: &K,
    mode: AccessMode,
) -> bool
where
    K: Eq + Hash + Clone,
{
    use std::collections::hash_map::Entry;
    match mode {
        AccessMode::Read => match states.entry(key.clone()) {
            Entry::Occupied(mut occupied) => match occupied.get_mut() {
                KeyState::Reading(n) => {
                    *n += 1;
                    true
                }
                KeyState::Writing => false,
            },
            Entry::Vacant(vacant) => {
                vacant.insert(KeyState::Reading(1));
                true
            }
        },
        AccessMode::Write => {
            if states.contains_key(key) {
                false
            } else {
                states.insert(key.clone(), KeyState::Writing);
                true
            }
        }
    }
}

/// Scoped token establishing reader/writer rights for one identity
///
/// Must be released exactly once; a second explicit release is rejected.
/// Dropping a still-armed token releases it.
pub struct ExclusionToken<K>
where
    K: Eq + Hash + Clone,
{
    inner: Arc<CoordinatorInner<K>>,
    key: K,
    mode: AccessMode,
    released: bool,
}

impl<K> ExclusionToken<K>
where
    K: Eq + Hash + Clone,
{
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Release the token. Exactly-once: a repeat call is an error.
    pub fn release(&mut self) -> ExclusionResult<()> {
        if self.released {
            return Err(ExclusionError::AlreadyReleased);
        }
        self.released = true;
        self.release_state();
        Ok(())
    }

    fn release_state(&self) {
        let mut states = self.inner.states.lock();
        match (states.get_mut(&self.key), self.mode) {
            (Some(KeyState::Reading(n)), AccessMode::Read) => {
                *n -= 1;
                if *n == 0 {
                    states.remove(&self.key);
                }
            }
            (Some(KeyState::Writing), AccessMode::Write) => {
                states.remove(&self.key);
            }
            _ => {
                // Unreachable unless the state map was corrupted
                log::error!("exclusion state out of sync on {} release", self.mode);
            }
        }
        drop(states);
        self.inner.freed.notify_all();
    }
}

impl<K> Drop for ExclusionToken<K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.release_state();
        }
    }
}

impl<K> fmt::Debug for ExclusionToken<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ExclusionToken")
            .field("key", &self.key)
            .field("mode", &self.mode)
            .field("released", &self.released)
            .finish()
    }
}
