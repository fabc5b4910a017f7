/*!
 * Idle Sweeper
 * Periodic background eviction of unleased handles
 */

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::PoolShared;

struct SweepSignal {
    stop: Mutex<bool>,
    wake: Condvar,
}

/// Background sweeper thread owned by a pool
///
/// Wakes every sweep interval, evicts eligible entries, and exits promptly
/// when stopped. Independent of caller threads by design: eviction-time
/// failures are never on any caller's stack.
pub(crate) struct Sweeper {
    signal: Arc<SweepSignal>,
    thread: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn spawn(pool: Arc<PoolShared>, interval: Duration) -> Self {
        let signal = Arc::new(SweepSignal {
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_signal = Arc::clone(&signal);
        let thread = thread::Builder::new()
            .name("handle-pool-sweeper".into())
            .spawn(move || {
                log::debug!("handle pool sweeper started, interval {:?}", interval);
                loop {
                    let mut stop = thread_signal.stop.lock();
                    if *stop {
                        break;
                    }
                    thread_signal.wake.wait_for(&mut stop, interval);
                    if *stop {
                        break;
                    }
                    drop(stop);
                    pool.sweep();
                }
                log::debug!("handle pool sweeper stopped");
            })
            .expect("failed to spawn handle-pool sweeper thread");

        Self {
            signal,
            thread: Some(thread),
        }
    }

    /// Stop and join the sweeper
    pub fn stop(&mut self) {
        *self.signal.stop.lock() = true;
        self.signal.wake.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("handle pool sweeper thread panicked");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
