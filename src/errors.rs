//! Error types for the resizable pool

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by caller-supplied callbacks
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared form of a callback error, kept cloneable inside [`PoolError`]
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// The caller-supplied callback that raised a [`PoolError::Collaborator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// The object factory
    Factory,
    /// The reset callback run before an object is pooled again
    Reset,
    /// The teardown hook that destroys an object
    Teardown,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::Factory => "factory",
            Hook::Reset => "reset",
            Hook::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Pool has been disposed")]
    Disposed,

    #[error("No object was supplied")]
    InvalidArgument,

    #[error("Invalid pool size: {requested}")]
    InvalidSize { requested: i128 },

    #[error("Factory returned no object")]
    FactoryReturnedNull,

    #[error("Pool is at maximum capacity")]
    PoolFull,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("{hook} callback failed: {source}")]
    Collaborator { hook: Hook, source: SharedError },
}

impl PoolError {
    pub(crate) fn collaborator(hook: Hook, error: impl Into<BoxError>) -> Self {
        PoolError::Collaborator {
            hook,
            source: Arc::from(error.into()),
        }
    }

    /// The hook that failed, if this error came from a callback
    pub fn hook(&self) -> Option<Hook> {
        match self {
            PoolError::Collaborator { hook, .. } => Some(*hook),
            _ => None,
        }
    }

    /// Downcast the callback's own error
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resizable_pool::{PoolConfiguration, PoolError, ResizablePool};
    ///
    /// #[derive(Debug, thiserror::Error)]
    /// #[error("socket refused")]
    /// struct Refused;
    ///
    /// let pool = ResizablePool::<u32>::with_fallible_factory(
    ///     || Err::<Option<u32>, _>(Refused),
    ///     PoolConfiguration::new(),
    /// );
    ///
    /// let err = pool.rent().unwrap_err();
    /// assert!(err.downcast_ref::<Refused>().is_some());
    /// ```
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            PoolError::Collaborator { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
