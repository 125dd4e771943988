//! The resizable object pool

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, Stopwatch};
use crate::config::PoolConfiguration;
use crate::errors::{BoxError, Hook, PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::hooks::{
    FactoryFn, NoopTeardown, ResetFn, Teardown, fallible_factory, infallible_factory, reset_fn,
};
use crate::metrics::{MetricsExporter, MetricsTracker, Occupancy, PoolMetrics};
use crate::state::{EntryState, PoolState, key_of};

/// Result of a state transition together with the objects it evicted
///
/// Evicted objects are torn down once the pool gate has been released.
struct Settlement<T, R> {
    result: PoolResult<R>,
    doomed: Vec<Arc<T>>,
}

impl<T, R> Settlement<T, R> {
    fn ok(value: R, doomed: Vec<Arc<T>>) -> Self {
        Self {
            result: Ok(value),
            doomed,
        }
    }

    fn err(error: PoolError) -> Self {
        Self {
            result: Err(error),
            doomed: Vec::new(),
        }
    }
}

/// Thread-safe object pool whose capacity can change at runtime
///
/// Objects are created on demand by a factory, reset when returned and kept
/// for reuse. Shrinking the pool, by [`resize`](Self::resize) or by age with
/// [`shrink`](Self::shrink), destroys idle objects right away; rented objects
/// caught by the shrink are destroyed when they come back.
///
/// Objects are handed out as `Arc<T>` and recognised by identity, so returning
/// a clone twice or returning an object the pool never made is harmless.
///
/// # Examples
///
/// ```
/// use esox_resizable_pool::{PoolConfiguration, ResizablePool};
///
/// let pool = ResizablePool::new(|| Vec::<u8>::with_capacity(1024), PoolConfiguration::new().with_max_pool_size(2));
///
/// let a = pool.rent().unwrap();
/// let b = pool.rent().unwrap();
/// assert!(pool.try_rent().unwrap().is_none());
///
/// pool.return_object(a).unwrap();
/// pool.resize(1).unwrap();
/// assert_eq!(pool.current_pool_size(), 1);
///
/// pool.return_object(b).unwrap();
/// assert_eq!(pool.available_count(), 1);
/// ```
pub struct ResizablePool<T: Send + Sync + 'static> {
    state: Mutex<PoolState<T>>,
    dispose_gate: Mutex<()>,
    factory: FactoryFn<T>,
    reset: Option<ResetFn<T>>,
    teardown: Arc<dyn Teardown<T>>,
    clock: Arc<dyn Clock>,
    config: PoolConfiguration,
    metrics: MetricsTracker,
}

impl<T: Send + Sync + 'static> ResizablePool<T> {
    /// Create a pool whose factory always succeeds
    pub fn new<F>(factory: F, config: PoolConfiguration) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_parts(infallible_factory(factory), config)
    }

    /// Create a pool whose factory may fail or produce nothing
    ///
    /// `Ok(None)` from the factory is reported as
    /// [`PoolError::FactoryReturnedNull`]; errors are passed through as
    /// [`PoolError::Collaborator`].
    pub fn with_fallible_factory<F, E>(factory: F, config: PoolConfiguration) -> Self
    where
        F: Fn() -> Result<Option<T>, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::from_parts(fallible_factory(factory), config)
    }

    fn from_parts(factory: FactoryFn<T>, config: PoolConfiguration) -> Self {
        Self {
            state: Mutex::new(PoolState::new(config.max_pool_size)),
            dispose_gate: Mutex::new(()),
            factory,
            reset: None,
            teardown: Arc::new(NoopTeardown),
            clock: Arc::new(Stopwatch::start_new()),
            config,
            metrics: MetricsTracker::new(),
        }
    }

    /// Run `reset` on every object before it is pooled again
    pub fn with_reset<F, E>(mut self, reset: F) -> Self
    where
        F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.reset = Some(reset_fn(reset));
        self
    }

    /// Destroy evicted objects with `teardown`
    pub fn with_teardown<D>(mut self, teardown: D) -> Self
    where
        D: Teardown<T> + 'static,
    {
        self.teardown = Arc::new(teardown);
        self
    }

    /// Timestamp objects with `clock` instead of a fresh [`Stopwatch`]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Rent an object, creating one if none is idle and the pool is not full
    ///
    /// Fails with [`PoolError::PoolFull`] when every owned object is rented
    /// and the pool is at capacity.
    pub fn rent(&self) -> PoolResult<Arc<T>> {
        let mut state = self.state.lock();
        if state.is_disposed() {
            return Err(PoolError::Disposed);
        }

        let now = self.clock.elapsed();
        if let Some(object) = state.rent_oldest(now) {
            MetricsTracker::add(&self.metrics.rented, 1);
            trace!(available = state.available_count(), "rented idle object");
            return Ok(object);
        }

        if state.is_full() {
            MetricsTracker::add(&self.metrics.pool_full_events, 1);
            return Err(PoolError::PoolFull);
        }

        let object = match (self.factory)() {
            Ok(Some(value)) => Arc::new(value),
            Ok(None) => return Err(PoolError::FactoryReturnedNull),
            Err(error) => return Err(PoolError::collaborator(Hook::Factory, error)),
        };
        state.admit_rented(Arc::clone(&object), now);
        MetricsTracker::add(&self.metrics.created, 1);
        MetricsTracker::add(&self.metrics.rented, 1);
        trace!(owned = state.owned_count(), "created object");
        Ok(object)
    }

    /// Rent an object, yielding `None` instead of an error when the pool is full
    pub fn try_rent(&self) -> PoolResult<Option<Arc<T>>> {
        match self.rent() {
            Ok(object) => Ok(Some(object)),
            Err(PoolError::PoolFull) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Rent an object, waiting up to the configured timeout for one to free up
    pub async fn rent_async(&self) -> PoolResult<Arc<T>> {
        let timeout = self.config.operation_timeout;

        let attempt = async {
            loop {
                match self.try_rent() {
                    Ok(Some(object)) => return Ok(object),
                    Ok(None) => tokio::time::sleep(self.config.retry_interval).await,
                    Err(error) => return Err(error),
                }
            }
        };

        tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| PoolError::Timeout(timeout))?
    }

    /// Give a rented object back to the pool
    ///
    /// The object is reset and becomes available again. Objects evicted while
    /// rented are destroyed instead. Returning an object twice, or one the pool
    /// does not own, does nothing.
    pub fn return_object(&self, object: Arc<T>) -> PoolResult<()> {
        let settlement = self.release(object);
        self.settle(settlement)
    }

    /// Same as [`return_object`](Self::return_object), awaiting teardown
    pub async fn return_object_async(&self, object: Arc<T>) -> PoolResult<()> {
        let settlement = self.release(object);
        self.settle_async(settlement).await
    }

    /// Return the outcome of [`try_rent`](Self::try_rent)
    ///
    /// Fails with [`PoolError::InvalidArgument`] if there is no object.
    pub fn return_rented(&self, object: Option<Arc<T>>) -> PoolResult<()> {
        let object = object.ok_or(PoolError::InvalidArgument)?;
        self.return_object(object)
    }

    fn release(&self, object: Arc<T>) -> Settlement<T, ()> {
        // `object` stays alive until the gate is released so its address
        // cannot be reused by a concurrently created entry.
        let key = key_of(&object);
        let mut state = self.state.lock();
        if state.is_disposed() && state.pending_count() == 0 {
            return Settlement::err(PoolError::Disposed);
        }

        match state.state_of(key) {
            Some(EntryState::PendingDeletion) => {
                trace!("destroying object evicted while rented");
                Settlement::ok((), state.remove(key).into_iter().collect())
            }
            Some(EntryState::Rented) => {
                if let Err(error) = self.run_reset(&object) {
                    MetricsTracker::add(&self.metrics.reset_failures, 1);
                    warn!(%error, "reset failed, destroying returned object");
                    return Settlement {
                        result: Err(error),
                        doomed: state.remove(key).into_iter().collect(),
                    };
                }
                state.make_available(key, self.clock.elapsed());
                MetricsTracker::add(&self.metrics.returned, 1);
                trace!(available = state.available_count(), "object returned");
                Settlement::ok((), Vec::new())
            }
            Some(EntryState::Available) | None => {
                trace!("ignoring return of an object that is not rented");
                Settlement::ok((), Vec::new())
            }
        }
    }

    /// Change the maximum number of objects the pool may own
    ///
    /// Growing first takes back objects that were evicted while rented and
    /// have not been returned yet. Shrinking destroys idle objects and, if that
    /// is not enough, marks rented ones for destruction on return.
    pub fn resize(&self, new_size: usize) -> PoolResult<()> {
        let settlement = self.resize_locked(|_| Ok(new_size));
        self.settle(settlement).map(|_| ())
    }

    /// Same as [`resize`](Self::resize), awaiting teardown
    pub async fn resize_async(&self, new_size: usize) -> PoolResult<()> {
        let settlement = self.resize_locked(|_| Ok(new_size));
        self.settle_async(settlement).await.map(|_| ())
    }

    /// Resize relative to the current maximum, returning the new maximum
    ///
    /// Fails with [`PoolError::InvalidSize`] if the result would be negative.
    pub fn resize_by(&self, delta: isize) -> PoolResult<usize> {
        let settlement = self.resize_locked(|max| {
            let requested = max as i128 + delta as i128;
            usize::try_from(requested).map_err(|_| PoolError::InvalidSize { requested })
        });
        self.settle(settlement)
    }

    fn resize_locked(
        &self,
        target: impl FnOnce(usize) -> PoolResult<usize>,
    ) -> Settlement<T, usize> {
        let mut state = self.state.lock();
        if state.is_disposed() {
            return Settlement::err(PoolError::Disposed);
        }
        let new_size = match target(state.max_pool_size()) {
            Ok(size) => size,
            Err(error) => return Settlement::err(error),
        };

        let current = state.owned_count();
        if new_size > current {
            let mut reclaimed = 0;
            for key in state.pending_keys(new_size - current) {
                let Some(object) = state.object(key) else {
                    continue;
                };
                if let Err(error) = self.run_reset(&object) {
                    MetricsTracker::add(&self.metrics.reset_failures, 1);
                    warn!(%error, reclaimed, "reset failed while reclaiming evicted object");
                    return Settlement {
                        result: Err(error),
                        doomed: state.remove(key).into_iter().collect(),
                    };
                }
                state.reclaim(key);
                reclaimed += 1;
            }
            state.set_max_pool_size(new_size);
            debug!(new_size, reclaimed, owned = state.owned_count(), "pool grown");
            Settlement::ok(new_size, Vec::new())
        } else {
            let to_delete = current - new_size;
            let idle = state.evict_idle(to_delete);
            let deferred = state.defer_rented(to_delete - idle.len());
            MetricsTracker::add(&self.metrics.deferred, deferred);
            state.set_max_pool_size(new_size);
            debug!(
                new_size,
                destroyed = idle.len(),
                deferred,
                "pool shrunk"
            );
            Settlement::ok(new_size, idle)
        }
    }

    /// Evict every owned object idle or rented for at least `retention`
    ///
    /// Idle objects are destroyed, rented ones are destroyed when returned.
    /// The maximum size is unchanged. Returns the number of objects still owned.
    pub fn shrink(&self, retention: Duration) -> PoolResult<usize> {
        let settlement = self.shrink_locked(retention);
        self.settle(settlement)
    }

    /// Same as [`shrink`](Self::shrink), awaiting teardown
    pub async fn shrink_async(&self, retention: Duration) -> PoolResult<usize> {
        let settlement = self.shrink_locked(retention);
        self.settle_async(settlement).await
    }

    fn shrink_locked(&self, retention: Duration) -> Settlement<T, usize> {
        let mut state = self.state.lock();
        if state.is_disposed() {
            return Settlement::err(PoolError::Disposed);
        }

        let (expired, deferred) = state.expire(self.clock.elapsed(), retention);
        MetricsTracker::add(&self.metrics.deferred, deferred);
        debug!(
            ?retention,
            destroyed = expired.len(),
            deferred,
            owned = state.owned_count(),
            "expired objects evicted"
        );
        Settlement::ok(state.owned_count(), expired)
    }

    /// Evict every owned object, keeping the maximum size
    pub fn clear(&self) -> PoolResult<()> {
        let settlement = self.clear_locked();
        self.settle(settlement)
    }

    /// Same as [`clear`](Self::clear), awaiting teardown
    pub async fn clear_async(&self) -> PoolResult<()> {
        let settlement = self.clear_locked();
        self.settle_async(settlement).await
    }

    fn clear_locked(&self) -> Settlement<T, ()> {
        let mut state = self.state.lock();
        if state.is_disposed() {
            return Settlement::err(PoolError::Disposed);
        }

        let (idle, deferred) = state.clear();
        MetricsTracker::add(&self.metrics.deferred, deferred);
        debug!(destroyed = idle.len(), deferred, "pool cleared");
        Settlement::ok((), idle)
    }

    /// Whether `object` is idle in this pool
    pub fn contains(&self, object: &Arc<T>) -> PoolResult<bool> {
        let state = self.state.lock();
        if state.is_disposed() {
            return Err(PoolError::Disposed);
        }
        Ok(state.state_of(key_of(object)) == Some(EntryState::Available))
    }

    /// Tear the pool down
    ///
    /// Idle objects are destroyed now. Rented objects are destroyed when they
    /// are returned, which stays possible after disposal. Every other
    /// operation fails with [`PoolError::Disposed`]. Disposing twice is a no-op.
    pub fn dispose(&self) -> PoolResult<()> {
        let settlement = self.dispose_locked();
        self.settle(settlement)
    }

    /// Same as [`dispose`](Self::dispose), awaiting teardown
    pub async fn dispose_async(&self) -> PoolResult<()> {
        let settlement = self.dispose_locked();
        self.settle_async(settlement).await
    }

    fn dispose_locked(&self) -> Settlement<T, ()> {
        let _gate = self.dispose_gate.lock();
        let mut state = self.state.lock();
        if state.is_disposed() {
            return Settlement::ok((), Vec::new());
        }

        let (idle, deferred) = state.dispose();
        MetricsTracker::add(&self.metrics.deferred, deferred);
        debug!(destroyed = idle.len(), deferred, "pool disposed");
        Settlement::ok((), idle)
    }

    fn run_reset(&self, object: &T) -> PoolResult<()> {
        match &self.reset {
            Some(reset) => reset(object).map_err(|error| PoolError::collaborator(Hook::Reset, error)),
            None => Ok(()),
        }
    }

    fn settle<R>(&self, settlement: Settlement<T, R>) -> PoolResult<R> {
        let torn_down = self.destroy_all(settlement.doomed);
        let value = settlement.result?;
        torn_down.map(|()| value)
    }

    async fn settle_async<R>(&self, settlement: Settlement<T, R>) -> PoolResult<R> {
        let torn_down = self.destroy_all_async(settlement.doomed).await;
        let value = settlement.result?;
        torn_down.map(|()| value)
    }

    fn destroy_all(&self, doomed: Vec<Arc<T>>) -> PoolResult<()> {
        let mut first_error = None;
        for object in doomed {
            MetricsTracker::add(&self.metrics.destroyed, 1);
            if let Err(error) = self.teardown.destroy(object) {
                warn!(%error, "teardown failed");
                first_error.get_or_insert_with(|| PoolError::collaborator(Hook::Teardown, error));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn destroy_all_async(&self, doomed: Vec<Arc<T>>) -> PoolResult<()> {
        let mut first_error = None;
        for object in doomed {
            MetricsTracker::add(&self.metrics.destroyed, 1);
            if let Err(error) = self.teardown.destroy_async(object).await {
                warn!(%error, "teardown failed");
                first_error.get_or_insert_with(|| PoolError::collaborator(Hook::Teardown, error));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn occupancy(&self) -> (Occupancy, bool) {
        let state = self.state.lock();
        let occupancy = Occupancy {
            owned: state.owned_count(),
            available: state.available_count(),
            pending: state.pending_count(),
            max_pool_size: state.max_pool_size(),
        };
        (occupancy, state.is_disposed())
    }

    /// Number of objects the pool owns, idle or rented
    pub fn current_pool_size(&self) -> usize {
        self.state.lock().owned_count()
    }

    /// Number of idle objects
    pub fn available_count(&self) -> usize {
        self.state.lock().available_count()
    }

    /// Number of owned objects rented out
    pub fn rented_count(&self) -> usize {
        self.state.lock().rented_count()
    }

    /// Number of evicted objects that have not been returned yet
    pub fn pending_deletion_count(&self) -> usize {
        self.state.lock().pending_count()
    }

    pub fn max_pool_size(&self) -> usize {
        self.state.lock().max_pool_size()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().is_disposed()
    }

    pub fn configuration(&self) -> &PoolConfiguration {
        &self.config
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let (occupancy, _) = self.occupancy();
        self.metrics.get_metrics(occupancy)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        let (occupancy, disposed) = self.occupancy();
        HealthStatus::new(occupancy, disposed)
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for ResizablePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (occupancy, disposed) = self.occupancy();
        f.debug_struct("ResizablePool")
            .field("occupancy", &occupancy)
            .field("disposed", &disposed)
            .finish()
    }
}

impl<T: Send + Sync + 'static> Drop for ResizablePool<T> {
    fn drop(&mut self) {
        if self.state.get_mut().is_disposed() {
            return;
        }
        let settlement = self.dispose_locked();
        if let Err(error) = self.settle(settlement) {
            warn!(%error, "teardown failed while dropping pool");
        }
    }
}
