use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crate::{CancellationToken, LockKind, LockSnapshot, ResourceLock};

#[test]
fn shared_holders_coexist() {
    let lock = Arc::new(ResourceLock::new("test"));
    let barrier = Arc::new(Barrier::new(2));

    let handles = (0..2)
        .map(|_| {
            let lock = lock.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let _hold = lock.shared();
                // Both threads reach the barrier only if neither blocked the other.
                barrier.wait();
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.join().expect("reader thread must finish");
    }
    assert_eq!(lock.snapshot(), LockSnapshot::default());
}

#[test]
fn exclusive_waits_for_every_shared_holder() {
    let lock = Arc::new(ResourceLock::new("test"));
    let first = lock.shared();
    let second = lock.shared();
    assert_eq!(lock.snapshot().shared_holders, 2);

    let (acquired_tx, acquired_rx) = mpsc::channel();
    let writer = {
        let lock = lock.clone();
        thread::spawn(move || {
            let hold = lock.exclusive();
            acquired_tx.send(hold.kind()).expect("must report acquisition");
        })
    };

    assert!(acquired_rx
        .recv_timeout(Duration::from_millis(100))
        .is_err());
    drop(first);
    assert!(acquired_rx
        .recv_timeout(Duration::from_millis(100))
        .is_err());
    drop(second);

    let kind = acquired_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("writer must acquire after readers release");
    assert_eq!(kind, LockKind::Exclusive);
    writer.join().expect("writer thread must finish");
}

#[test]
fn queued_writer_blocks_new_readers() {
    let lock = Arc::new(ResourceLock::new("test"));
    let reader = lock.shared();

    let (acquired_tx, acquired_rx) = mpsc::channel();
    let writer = {
        let lock = lock.clone();
        thread::spawn(move || {
            let hold = lock.exclusive();
            acquired_tx.send(hold.kind()).expect("must report acquisition");
        })
    };

    let mut waited = Duration::ZERO;
    while lock.waiting_exclusive() == 0 {
        assert!(waited < Duration::from_secs(5), "writer never queued");
        thread::sleep(Duration::from_millis(5));
        waited += Duration::from_millis(5);
    }
    assert!(lock.try_acquire(LockKind::Shared).is_none());
    assert_eq!(lock.snapshot().shared_holders, 1);

    drop(reader);
    let kind = acquired_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("writer must acquire once the reader leaves");
    assert_eq!(kind, LockKind::Exclusive);
    writer.join().expect("writer thread must finish");

    assert_eq!(lock.waiting_exclusive(), 0);
    assert!(lock.try_acquire(LockKind::Shared).is_some());
}

#[test]
fn shared_waits_for_exclusive_holder() {
    let lock = ResourceLock::new("test");
    let hold = lock.exclusive();
    assert!(lock.try_acquire(LockKind::Shared).is_none());
    assert!(lock.try_acquire(LockKind::Exclusive).is_none());
    hold.release();
    assert!(lock.try_acquire(LockKind::Shared).is_some());
}

#[test]
fn handle_is_released_on_error_paths() {
    fn failing(lock: &ResourceLock) -> Result<(), String> {
        let _hold = lock.exclusive();
        Err("boom".to_string())
    }

    let lock = ResourceLock::new("test");
    assert!(failing(&lock).is_err());
    assert_eq!(lock.snapshot(), LockSnapshot::default());
}

#[test]
fn handle_is_released_when_a_holder_panics() {
    let lock = Arc::new(ResourceLock::new("test"));
    let panicking = {
        let lock = lock.clone();
        thread::spawn(move || {
            let _hold = lock.exclusive();
            panic!("holder failed");
        })
    };
    assert!(panicking.join().is_err());
    assert!(lock.try_acquire(LockKind::Exclusive).is_some());
}

#[test]
fn independent_locks_nest_without_deadlock() {
    let outer = ResourceLock::new("resources");
    let inner = ResourceLock::new("installed");

    let _outer = outer.exclusive();
    {
        let _read = inner.shared();
        assert_eq!(inner.snapshot().shared_holders, 1);
    }
    let write = inner.exclusive();
    assert!(inner.snapshot().exclusive_held);
    assert!(outer.snapshot().exclusive_held);
    drop(write);
}

#[test]
fn global_lock_is_shared_across_callers() {
    let a = ResourceLock::global();
    let b = ResourceLock::global();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.label(), "resources");
}

#[test]
fn cancellation_token_clones_share_state() {
    let token = CancellationToken::new();
    let observer = token.clone();
    assert!(!observer.is_cancelled());
    token.cancel();
    assert!(observer.is_cancelled());
}
