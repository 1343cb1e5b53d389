use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use stripelock_common::prelude::*;
use stripelock_core::{LockBackend, LockManager, LockProperties, MemoryLockBackend, StripedLock};

type Manager = Arc<LockManager<MemoryLockBackend>>;

const SLACK: Duration = Duration::from_millis(40);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn manager_with_lease(lease_ms: i64) -> Manager {
    init_logger();
    Arc::new(
        LockManager::with_properties(
            MemoryLockBackend::new(),
            LockProperties {
                max_lease_time_ms: lease_ms,
                ..LockProperties::default()
            },
        )
        .expect("valid properties"),
    )
}

fn raw_record(manager: &Manager, name: &str) -> Option<String> {
    manager
        .backend()
        .get(&format!("lock:{}", name))
        .expect("memory backend never fails")
}

fn on_other_thread<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    thread::spawn(f).join().expect("thread panicked")
}

#[test]
fn uncontended_acquire_and_release() {
    let manager = manager_with_lease(60_000);

    assert!(manager.try_lock("x", 1000, TimeUnit::Milliseconds).unwrap());
    assert!(manager.is_held_by_current_thread("x").unwrap());

    manager.unlock("x").unwrap();
    assert!(!manager.is_held_by_current_thread("x").unwrap());
    assert_eq!(raw_record(&manager, "x"), None);
}

#[test]
fn contention_loser_times_out() {
    let manager = manager_with_lease(60_000);
    manager.lock("x").unwrap();
    let before = raw_record(&manager, "x").expect("record present");

    let contender = manager.clone();
    let (acquired, waited) = on_other_thread(move || {
        let start = Instant::now();
        let acquired = contender
            .try_lock("x", 100, TimeUnit::Milliseconds)
            .unwrap();
        (acquired, start.elapsed())
    });

    assert!(!acquired);
    assert!(waited >= Duration::from_millis(100), "waited {:?}", waited);
    // At most one retry sleep past the deadline, plus scheduling slack.
    let bound = Duration::from_millis(100) + manager.properties().retry_sleep() + SLACK;
    assert!(waited < bound, "waited {:?}, bound {:?}", waited, bound);
    assert_eq!(raw_record(&manager, "x"), Some(before));
    assert!(manager.is_held_by_current_thread("x").unwrap());
}

#[test]
fn lease_expiry_allows_reacquire() {
    let manager = manager_with_lease(200);
    manager.lock("x").unwrap();
    thread::sleep(Duration::from_millis(400));

    let contender = manager.clone();
    let acquired = on_other_thread(move || {
        contender
            .try_lock("x", 500, TimeUnit::Milliseconds)
            .unwrap()
    });

    assert!(acquired);
    assert!(!manager.is_held_by_current_thread("x").unwrap());

    // The stale holder must not release the new owner's record.
    let record = raw_record(&manager, "x");
    manager.unlock("x").unwrap();
    assert_eq!(raw_record(&manager, "x"), record);
}

#[test]
fn cross_caller_unlock_is_refused() {
    let manager = manager_with_lease(60_000);
    manager.lock("x").unwrap();
    let before = raw_record(&manager, "x");

    let other = manager.clone();
    on_other_thread(move || {
        assert!(!other.is_held_by_current_thread("x").unwrap());
        other.unlock("x").unwrap();
    });

    assert_eq!(raw_record(&manager, "x"), before);
    assert!(manager.is_held_by_current_thread("x").unwrap());
}

#[test]
fn unlock_without_acquire_is_noop() {
    let manager = manager_with_lease(60_000);
    manager.unlock("never").unwrap();
    manager.unlock("never").unwrap();
    assert!(manager.backend().is_empty());
}

#[test]
fn force_unlock_bypasses_ownership() {
    let manager = manager_with_lease(60_000);
    manager.lock("x").unwrap();

    let admin = manager.clone();
    on_other_thread(move || admin.force_unlock("x").unwrap());

    assert_eq!(raw_record(&manager, "x"), None);
    assert!(!manager.is_held_by_current_thread("x").unwrap());
}

#[test]
fn blocking_lock_waits_for_release() {
    let manager = manager_with_lease(60_000);
    manager.lock("x").unwrap();

    let waiter = manager.clone();
    let handle = thread::spawn(move || {
        waiter.lock("x").unwrap();
        let acquired_at = Instant::now();
        let held = waiter.is_held_by_current_thread("x").unwrap();
        waiter.unlock("x").unwrap();
        (acquired_at, held)
    });

    thread::sleep(Duration::from_millis(50));
    let released_at = Instant::now();
    manager.unlock("x").unwrap();

    let (acquired_at, held) = handle.join().expect("thread panicked");
    assert!(held);
    assert!(acquired_at >= released_at);
    // The waiter notices the release on its next attempt, one retry sleep later at most.
    let bound = manager.properties().retry_sleep() + SLACK;
    assert!(
        acquired_at - released_at < bound,
        "waiter took {:?} after release, bound {:?}",
        acquired_at - released_at,
        bound
    );
}

#[test]
fn at_most_one_holder_at_a_time() {
    let manager = manager_with_lease(60_000);
    let inside = Arc::new(AtomicUsize::new(0));
    let entries = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            let inside = inside.clone();
            let entries = entries.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    manager.lock("counter").unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    thread::sleep(Duration::from_millis(1));
                    entries.fetch_add(1, Ordering::SeqCst);
                    inside.fetch_sub(1, Ordering::SeqCst);
                    manager.unlock("counter").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread panicked");
    }

    assert_eq!(entries.load(Ordering::SeqCst), 160);
    assert!(manager.backend().is_empty());
}

#[test]
fn names_are_independent() {
    let manager = manager_with_lease(60_000);
    manager.lock("a").unwrap();

    let other = manager.clone();
    let acquired = on_other_thread(move || {
        let acquired = other.try_lock("b", 50, TimeUnit::Milliseconds).unwrap();
        other.unlock("b").unwrap();
        acquired
    });

    assert!(acquired);
    assert!(manager.is_held_by_current_thread("a").unwrap());
}

#[test]
fn custom_key_prefix_is_used() {
    init_logger();
    let manager = LockManager::with_properties(
        MemoryLockBackend::new(),
        LockProperties {
            key_prefix: "mutex/".to_string(),
            ..LockProperties::default()
        },
    )
    .unwrap();

    manager.lock("x").unwrap();
    assert!(manager.backend().get("mutex/x").unwrap().is_some());
    assert_eq!(manager.backend().get("lock:x").unwrap(), None);
}

#[test]
fn shutdown_interrupts_blocking_lock() {
    let manager = manager_with_lease(60_000);
    manager.lock("x").unwrap();

    let waiter = manager.clone();
    let handle = thread::spawn(move || {
        let start = Instant::now();
        let result = waiter.lock("x");
        (result, start.elapsed())
    });

    thread::sleep(Duration::from_millis(50));
    manager.shutdown();

    let (result, waited) = handle.join().expect("thread panicked");
    let err = result.unwrap_err();
    assert_eq!(err.code(), ErrorCode::LockAcquisitionCode());
    assert!(waited < Duration::from_millis(1_000), "waited {:?}", waited);

    // The holder can still release after shutdown.
    assert!(manager.is_held_by_current_thread("x").unwrap());
    manager.unlock("x").unwrap();
    assert!(manager.backend().is_empty());
}

/// Fails the first `failing_puts` conditional puts, and every read while `fail_reads` is set.
struct FlakyBackend {
    inner: MemoryLockBackend,
    failing_puts: AtomicUsize,
    fail_reads: AtomicBool,
}

impl FlakyBackend {
    fn new(failing_puts: usize) -> Self {
        Self {
            inner: MemoryLockBackend::new(),
            failing_puts: AtomicUsize::new(failing_puts),
            fail_reads: AtomicBool::new(false),
        }
    }
}

impl LockBackend for FlakyBackend {
    fn set_if_absent(&self, key: &str, value: &str, ttl_ms: i64) -> LockResult<bool> {
        let remaining = self.failing_puts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_puts.store(remaining - 1, Ordering::SeqCst);
            return str_err!(Backend, "connection reset");
        }
        self.inner.set_if_absent(key, value, ttl_ms)
    }

    fn get(&self, key: &str) -> LockResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return str_err!(Backend, "connection reset");
        }
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> LockResult<()> {
        self.inner.delete(key)
    }
}

#[test]
fn backend_errors_are_retried_while_acquiring() {
    init_logger();
    let manager = LockManager::new(FlakyBackend::new(3)).unwrap();

    assert!(manager.try_lock("x", 1_000, TimeUnit::Milliseconds).unwrap());
    assert_eq!(manager.backend().failing_puts.load(Ordering::SeqCst), 0);
    assert!(manager.is_held_by_current_thread("x").unwrap());
}

#[test]
fn persistent_backend_errors_end_in_timeout() {
    init_logger();
    let manager = LockManager::new(FlakyBackend::new(usize::MAX)).unwrap();

    assert!(!manager.try_lock("x", 50, TimeUnit::Milliseconds).unwrap());
}

#[test]
fn backend_errors_surface_from_release_and_query() {
    init_logger();
    let manager = LockManager::new(FlakyBackend::new(0)).unwrap();
    manager.lock("x").unwrap();

    manager.backend().fail_reads.store(true, Ordering::SeqCst);
    let err = manager.is_held_by_current_thread("x").unwrap_err();
    assert_eq!(err.code(), ErrorCode::BackendCode());
    let err = manager.unlock("x").unwrap_err();
    assert_eq!(err.code(), ErrorCode::BackendCode());

    manager.backend().fail_reads.store(false, Ordering::SeqCst);
    assert!(manager.is_held_by_current_thread("x").unwrap());
    manager.unlock("x").unwrap();
    assert!(!manager.is_held_by_current_thread("x").unwrap());
}

#[test]
fn try_lock_converts_units() {
    let manager = manager_with_lease(60_000);
    manager.lock("x").unwrap();

    let contender = manager.clone();
    let (acquired, waited) = on_other_thread(move || {
        let start = Instant::now();
        // 0.2s expressed in microseconds.
        let acquired = contender
            .try_lock("x", 200_000, TimeUnit::Microseconds)
            .unwrap();
        (acquired, start.elapsed())
    });

    assert!(!acquired);
    assert!(waited >= Duration::from_millis(200), "waited {:?}", waited);
}
