use esox_resizable_pool::{
    BoxError, ManualClock, PoolConfiguration, PoolError, ResizablePool, TeardownFn,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Probe {
    created: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
    destroyed: Arc<AtomicUsize>,
}

impl Probe {
    fn new() -> Self {
        Self {
            created: Arc::new(AtomicUsize::new(0)),
            resets: Arc::new(AtomicUsize::new(0)),
            destroyed: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn pool(&self, max: usize) -> ResizablePool<usize> {
        let created = Arc::clone(&self.created);
        let resets = Arc::clone(&self.resets);
        let destroyed = Arc::clone(&self.destroyed);

        ResizablePool::new(
            move || created.fetch_add(1, Ordering::SeqCst),
            PoolConfiguration::new().with_max_pool_size(max),
        )
        .with_reset(move |_: &usize| {
            resets.fetch_add(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        })
        .with_teardown(TeardownFn::new(move |_: Arc<usize>| {
            destroyed.fetch_add(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        }))
    }

    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

fn assert_counts_consistent(pool: &ResizablePool<usize>) {
    assert_eq!(
        pool.rented_count() + pool.available_count(),
        pool.current_pool_size()
    );
    assert!(pool.current_pool_size() <= pool.max_pool_size());
}

#[test]
fn rent_return_sequence_keeps_counts_consistent() {
    let probe = Probe::new();
    let pool = probe.pool(4);
    let mut held = Vec::new();

    for step in 0..40 {
        if step % 3 == 2 {
            if let Some(object) = held.pop() {
                pool.return_object(object).unwrap();
            }
        } else if let Some(object) = pool.try_rent().unwrap() {
            held.push(object);
        }
        assert_counts_consistent(&pool);
    }

    assert!(probe.created() <= 4);
}

#[test]
fn factory_runs_only_when_nothing_is_idle() {
    let probe = Probe::new();
    let pool = probe.pool(3);

    let a = pool.rent().unwrap();
    let b = pool.rent().unwrap();
    assert_eq!(probe.created(), 2);

    pool.return_object(a).unwrap();
    let _c = pool.rent().unwrap();
    assert_eq!(probe.created(), 2);

    pool.return_object(b).unwrap();
    let _d = pool.rent().unwrap();
    let _e = pool.rent().unwrap();
    assert_eq!(probe.created(), 3);
}

#[test]
fn returning_twice_resets_once() {
    let probe = Probe::new();
    let pool = probe.pool(2);
    let object = pool.rent().unwrap();

    pool.return_object(Arc::clone(&object)).unwrap();
    pool.return_object(object).unwrap();

    assert_eq!(probe.resets(), 1);
    assert_eq!(pool.available_count(), 1);
}

#[test]
fn returning_a_stranger_is_ignored() {
    let probe = Probe::new();
    let pool = probe.pool(2);

    pool.return_object(Arc::new(7)).unwrap();

    assert_eq!(probe.resets(), 0);
    assert_eq!(pool.current_pool_size(), 0);
}

#[test]
fn resize_down_then_up_reuses_evicted_objects() {
    let probe = Probe::new();
    let pool = probe.pool(6);
    let held: Vec<_> = (0..6).map(|_| pool.rent().unwrap()).collect();

    pool.resize(2).unwrap();
    assert_eq!(pool.pending_deletion_count(), 4);

    pool.resize(5).unwrap();
    assert_eq!(pool.pending_deletion_count(), 1);
    assert_eq!(pool.current_pool_size(), 5);
    assert_eq!(probe.created(), 6);

    for object in held {
        pool.return_object(object).unwrap();
    }
    assert_eq!(probe.destroyed(), 1);
    assert_eq!(pool.current_pool_size(), 5);
    assert_eq!(pool.available_count(), 5);
}

#[test]
fn resize_ten_to_five_with_everything_rented() {
    let probe = Probe::new();
    let pool = probe.pool(10);
    let held: Vec<_> = (0..10).map(|_| pool.rent().unwrap()).collect();

    pool.resize(5).unwrap();
    assert_eq!(pool.pending_deletion_count(), 5);

    for object in held {
        pool.return_object(object).unwrap();
    }

    assert_eq!(probe.destroyed(), 5);
    assert_eq!(pool.available_count(), 5);
    assert_eq!(pool.current_pool_size(), 5);
    assert_eq!(pool.current_pool_size(), pool.max_pool_size());
}

#[test]
fn shrink_by_age_respects_retention() {
    let probe = Probe::new();
    let clock = Arc::new(ManualClock::new());
    let pool = probe.pool(3).with_clock(clock.clone());

    let old_idle = pool.rent().unwrap();
    let old_rented = pool.rent().unwrap();
    pool.return_object(Arc::clone(&old_idle)).unwrap();

    clock.advance(Duration::from_secs(30));
    let fresh = pool.rent().unwrap();
    assert!(Arc::ptr_eq(&fresh, &old_idle));
    let newer = pool.rent().unwrap();
    pool.return_object(Arc::clone(&newer)).unwrap();

    clock.advance(Duration::from_secs(30));
    let owned = pool.shrink(Duration::from_secs(45)).unwrap();

    // Only `old_rented` has been inactive for 60s.
    assert_eq!(owned, 2);
    assert_eq!(pool.pending_deletion_count(), 1);
    assert_eq!(probe.destroyed(), 0);
    assert!(pool.contains(&newer).unwrap());

    pool.return_object(old_rented).unwrap();
    assert_eq!(probe.destroyed(), 1);
    drop(fresh);
}

#[test]
fn factory_without_object_fails_rent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let pool = ResizablePool::<Vec<u8>>::with_fallible_factory(
        move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BoxError>(None)
        },
        PoolConfiguration::new().with_max_pool_size(1),
    );

    assert!(matches!(pool.rent(), Err(PoolError::FactoryReturnedNull)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn disposing_an_empty_pool_twice() {
    let probe = Probe::new();
    let pool = probe.pool(4);

    pool.dispose().unwrap();
    assert_eq!(pool.current_pool_size(), 0);
    pool.dispose().unwrap();
    assert_eq!(pool.current_pool_size(), 0);
}

#[test]
fn disposed_pool_still_accepts_evicted_objects() {
    let probe = Probe::new();
    let pool = probe.pool(2);
    let object = pool.rent().unwrap();
    pool.resize(0).unwrap();
    pool.dispose().unwrap();

    assert!(matches!(pool.rent(), Err(PoolError::Disposed)));

    pool.return_object(object).unwrap();
    assert_eq!(probe.destroyed(), 1);
    assert_eq!(probe.resets(), 0);
}

#[test]
fn objects_rented_at_disposal_are_destroyed_on_return() {
    let probe = Probe::new();
    let pool = probe.pool(2);
    let object = pool.rent().unwrap();

    pool.dispose().unwrap();
    assert_eq!(pool.pending_deletion_count(), 1);

    pool.return_object(object).unwrap();
    assert_eq!(probe.destroyed(), 1);
    assert!(matches!(
        pool.return_object(Arc::new(0)),
        Err(PoolError::Disposed)
    ));
}
