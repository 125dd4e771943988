//! Caller-supplied callbacks: factory, reset and teardown

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::BoxError;

/// Creates a new object; `Ok(None)` is a contract violation
pub(crate) type FactoryFn<T> = Arc<dyn Fn() -> Result<Option<T>, BoxError> + Send + Sync>;

/// Restores a returned object to a reusable state
pub(crate) type ResetFn<T> = Arc<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;

/// Destroys objects the pool no longer wants
///
/// The blocking form is used by the synchronous pool operations and the
/// suspending form by their `_async` counterparts. Implementors that only have
/// a blocking teardown can rely on the default `destroy_async`.
///
/// The object arrives as the pool's last handle on it; whatever the caller
/// still holds keeps it alive until dropped.
///
/// # Examples
///
/// ```
/// use esox_resizable_pool::{BoxError, Teardown};
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// struct CloseConnection;
///
/// #[async_trait]
/// impl Teardown<String> for CloseConnection {
///     fn destroy(&self, conn: Arc<String>) -> Result<(), BoxError> {
///         println!("closing {conn}");
///         Ok(())
///     }
///
///     async fn destroy_async(&self, conn: Arc<String>) -> Result<(), BoxError> {
///         tokio::task::yield_now().await;
///         self.destroy(conn)
///     }
/// }
/// ```
#[async_trait]
pub trait Teardown<T: Send + Sync + 'static>: Send + Sync {
    /// Destroy `object`, blocking until done
    fn destroy(&self, object: Arc<T>) -> Result<(), BoxError>;

    /// Destroy `object` without blocking the executor
    async fn destroy_async(&self, object: Arc<T>) -> Result<(), BoxError> {
        self.destroy(object)
    }
}

/// Teardown for objects without a teardown step of their own
///
/// Releasing the pool's handle is all it does, so `T`'s `Drop` runs once the
/// last handle is gone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTeardown;

#[async_trait]
impl<T: Send + Sync + 'static> Teardown<T> for NoopTeardown {
    fn destroy(&self, object: Arc<T>) -> Result<(), BoxError> {
        drop(object);
        Ok(())
    }
}

/// Blocking teardown built from a closure
///
/// # Examples
///
/// ```
/// use esox_resizable_pool::{PoolConfiguration, ResizablePool, TeardownFn};
///
/// let pool = ResizablePool::new(|| vec![0u8; 16], PoolConfiguration::new())
///     .with_teardown(TeardownFn::new(|buf: std::sync::Arc<Vec<u8>>| {
///         println!("releasing {} bytes", buf.len());
///         Ok::<(), std::io::Error>(())
///     }));
/// # drop(pool);
/// ```
pub struct TeardownFn<F> {
    func: F,
}

impl<F> TeardownFn<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<T, F, E> Teardown<T> for TeardownFn<F>
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>) -> Result<(), E> + Send + Sync,
    E: Into<BoxError>,
{
    fn destroy(&self, object: Arc<T>) -> Result<(), BoxError> {
        (self.func)(object).map_err(Into::into)
    }
}

pub(crate) fn fallible_factory<T, F, E>(factory: F) -> FactoryFn<T>
where
    F: Fn() -> Result<Option<T>, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    Arc::new(move || factory().map_err(Into::into))
}

pub(crate) fn infallible_factory<T, F>(factory: F) -> FactoryFn<T>
where
    F: Fn() -> T + Send + Sync + 'static,
{
    Arc::new(move || Ok(Some(factory())))
}

pub(crate) fn reset_fn<T, F, E>(reset: F) -> ResetFn<T>
where
    F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    Arc::new(move |object| reset(object).map_err(Into::into))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_closure_teardown_runs_for_both_forms() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let teardown = TeardownFn::new(move |_: Arc<u32>| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok::<(), std::io::Error>(())
        });

        teardown.destroy(Arc::new(1)).unwrap();
        teardown.destroy_async(Arc::new(2)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_noop_teardown_drops_last_handle() {
        let object = Arc::new(String::from("conn"));
        let weak = Arc::downgrade(&object);

        Teardown::destroy(&NoopTeardown, object).unwrap();

        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_factory_adapters() {
        let make = infallible_factory(|| 7u8);
        assert_eq!(make().unwrap(), Some(7));

        let absent = fallible_factory(|| Ok::<Option<u8>, std::io::Error>(None));
        assert_eq!(absent().unwrap(), None);
    }
}
