//! # Esox Resizable Pool
//!
//! Thread-safe object pool whose capacity can change while it is in use.
//!
//! ## Features
//!
//! - Objects created on demand by a factory and reused across rent/return cycles
//! - Reset callback run on every return
//! - Runtime resize: growing reuses evicted objects first, shrinking destroys
//!   idle objects at once and rented ones when they come back
//! - Age-based shrinking against a pluggable [`Clock`]
//! - Blocking and async teardown through [`Teardown`]
//! - Health monitoring and metrics, with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resizable_pool::{PoolConfiguration, ResizablePool};
//! use std::time::Duration;
//!
//! let pool = ResizablePool::new(|| String::with_capacity(64), PoolConfiguration::new().with_max_pool_size(8))
//!     .with_reset(|s: &String| if s.capacity() >= 64 { Ok(()) } else { Err("shrunk buffer") });
//!
//! let buffer = pool.rent().unwrap();
//! pool.return_object(buffer).unwrap();
//!
//! // Drop everything idle for more than a minute
//! pool.shrink(Duration::from_secs(60)).unwrap();
//! ```

mod clock;
mod config;
mod errors;
mod health;
mod hooks;
mod metrics;
mod pool;
mod state;

pub use clock::{Clock, ManualClock, Stopwatch, TICKS_PER_SECOND};
pub use config::PoolConfiguration;
pub use errors::{BoxError, Hook, PoolError, PoolResult, SharedError};
pub use health::HealthStatus;
pub use hooks::{NoopTeardown, Teardown, TeardownFn};
#[cfg(feature = "metrics")]
pub use metrics::PoolCollector;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::ResizablePool;
