/*!
 * Idle Eviction Tests
 */

use handle_pool::{AccessFlags, HandlePool, PoolConfig};
use parking_lot::Mutex;
use std::io::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

fn fast_pool(evictions: Arc<AtomicUsize>) -> HandlePool {
    HandlePool::new(
        PoolConfig::new(Duration::from_millis(50))
            .with_sweep_interval(Duration::from_millis(10))
            .with_eviction_observer(move |_key, _handle| {
                evictions.fetch_add(1, Ordering::SeqCst);
            }),
    )
}

fn wait_until<F: Fn() -> bool>(deadline: Duration, condition: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_idle_entry_evicted_after_timeout() {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(b"content").unwrap();
    temp.flush().unwrap();

    let evictions = Arc::new(AtomicUsize::new(0));
    let pool = fast_pool(Arc::clone(&evictions));
    let flags = AccessFlags::read_only();

    let lease = pool.lease(temp.path(), flags).unwrap();
    lease.release();
    assert!(pool.contains(temp.path(), flags));

    assert!(
        wait_until(Duration::from_secs(2), || !pool.contains(temp.path(), flags)),
        "idle entry was not evicted"
    );
    assert_eq!(evictions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_leased_entry_never_evicted() {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(b"content").unwrap();
    temp.flush().unwrap();

    let evictions = Arc::new(AtomicUsize::new(0));
    let pool = fast_pool(Arc::clone(&evictions));
    let flags = AccessFlags::read_only();

    let lease = pool.lease(temp.path(), flags).unwrap();

    // Far longer than timeout plus sweep cadence
    thread::sleep(Duration::from_millis(300));
    assert!(pool.contains(temp.path(), flags));
    assert_eq!(evictions.load(Ordering::SeqCst), 0);

    // The handle must still work after all that idle time
    let mut buf = [0u8; 7];
    assert_eq!(lease.use_handle(|ops| ops.read(&mut buf)).unwrap(), 7);
    assert_eq!(&buf, b"content");

    // Only once released does the idle clock start
    lease.release();
    assert!(
        wait_until(Duration::from_secs(2), || !pool.contains(temp.path(), flags)),
        "entry not evicted after release"
    );
    assert_eq!(evictions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_observer_sees_key_and_handle() {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(b"content").unwrap();
    temp.flush().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let pool = HandlePool::new(
        PoolConfig::new(Duration::from_millis(50))
            .with_sweep_interval(Duration::from_millis(10))
            .with_eviction_observer(move |key, handle| {
                seen_clone
                    .lock()
                    .push((key.path().to_path_buf(), handle.position()));
            }),
    );

    let lease = pool.lease(temp.path(), AccessFlags::read_only()).unwrap();
    lease.release();

    assert!(wait_until(Duration::from_secs(2), || !seen.lock().is_empty()));
    assert_eq!(seen.lock()[0].0, temp.path());
}

#[test]
fn test_fresh_handle_after_eviction() {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(b"content").unwrap();
    temp.flush().unwrap();

    let evictions = Arc::new(AtomicUsize::new(0));
    let pool = fast_pool(Arc::clone(&evictions));
    let flags = AccessFlags::read_only();

    let lease = pool.lease(temp.path(), flags).unwrap();
    lease.release();
    assert!(wait_until(Duration::from_secs(2), || !pool.contains(temp.path(), flags)));

    // A fresh lease after eviction opens a new handle and works
    let lease = pool.lease(temp.path(), flags).unwrap();
    let mut buf = [0u8; 7];
    assert_eq!(lease.use_handle(|ops| ops.read(&mut buf)).unwrap(), 7);
    assert_eq!(&buf, b"content");
}
