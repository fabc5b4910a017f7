/*!
 * Pool Configuration
 * Idle-eviction timing and the eviction observer
 */

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::handle::{GuardedHandle, HandleKey};

/// Observer invoked with `(key, handle)` just before an idle handle is closed
pub type EvictionObserver = Arc<dyn Fn(&HandleKey, &GuardedHandle) + Send + Sync>;

/// Lower bound for the derived sweep cadence
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(25);

/// Handle pool configuration
#[derive(Clone)]
pub struct PoolConfig {
    /// How long an unleased handle may sit idle before eviction
    pub idle_timeout: Duration,
    /// Sweep cadence; `None` derives it from `idle_timeout`
    pub sweep_interval: Option<Duration>,
    /// Eviction observer for diagnostics/testing
    pub on_evicted: Option<EvictionObserver>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(20),
            sweep_interval: None,
            on_evicted: None,
        }
    }
}

impl PoolConfig {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            ..Self::default()
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    pub fn with_eviction_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&HandleKey, &GuardedHandle) + Send + Sync + 'static,
    {
        self.on_evicted = Some(Arc::new(observer));
        self
    }

    /// Sweep cadence actually used by the background sweeper.
    ///
    /// Defaults to a quarter of the idle timeout, clamped to
    /// [25 ms, idle_timeout], which bounds eviction latency to one
    /// interval past the timeout.
    pub(crate) fn effective_sweep_interval(&self) -> Duration {
        match self.sweep_interval {
            Some(interval) => interval.max(Duration::from_millis(1)),
            None => (self.idle_timeout / 4)
                .clamp(MIN_SWEEP_INTERVAL, self.idle_timeout.max(MIN_SWEEP_INTERVAL)),
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("idle_timeout", &self.idle_timeout)
            .field("sweep_interval", &self.sweep_interval)
            .field("on_evicted", &self.on_evicted.as_ref().map(|_| "<observer>"))
            .finish()
    }
}
