//! Metrics collection and export for resizable pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use esox_resizable_pool::{PoolConfiguration, ResizablePool};
///
/// let pool = ResizablePool::new(|| 0u64, PoolConfiguration::new().with_max_pool_size(4));
///
/// let obj = pool.rent().unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_created, 1);
/// assert_eq!(metrics.rented_objects, 1);
///
/// pool.return_object(obj).unwrap();
/// assert_eq!(pool.get_metrics().available_objects, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolMetrics {
    /// Objects produced by the factory
    pub total_created: usize,

    /// Successful rents, reused or freshly created
    pub total_rented: usize,

    /// Objects returned and pooled again
    pub total_returned: usize,

    /// Objects handed to the teardown hook
    pub total_destroyed: usize,

    /// Rent attempts that found the pool full
    pub pool_full_events: usize,

    /// Reset callbacks that failed
    pub reset_failures: usize,

    /// Rented objects whose destruction was deferred to their return
    pub deferred_destructions: usize,

    /// Objects owned by the pool, idle or rented
    pub owned_objects: usize,

    /// Idle objects ready to rent
    pub available_objects: usize,

    /// Owned objects currently rented out
    pub rented_objects: usize,

    /// Evicted objects still waiting to be returned
    pub pending_deletion: usize,

    /// Current capacity bound
    pub max_pool_size: usize,

    /// Owned objects relative to capacity (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_rented".to_string(), self.total_rented.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("pool_full_events".to_string(), self.pool_full_events.to_string());
        metrics.insert("reset_failures".to_string(), self.reset_failures.to_string());
        metrics.insert(
            "deferred_destructions".to_string(),
            self.deferred_destructions.to_string(),
        );
        metrics.insert("owned_objects".to_string(), self.owned_objects.to_string());
        metrics.insert("available_objects".to_string(), self.available_objects.to_string());
        metrics.insert("rented_objects".to_string(), self.rented_objects.to_string());
        metrics.insert("pending_deletion".to_string(), self.pending_deletion.to_string());
        metrics.insert("max_pool_size".to_string(), self.max_pool_size.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resizable_pool::{PoolConfiguration, ResizablePool};
    /// use std::collections::HashMap;
    ///
    /// let pool = ResizablePool::new(|| 1u8, PoolConfiguration::default());
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("buffers", Some(&tags));
    /// assert!(output.contains("objectpool_objects_owned"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(pool_name, tags);
        let mut output = String::new();

        let gauges = [
            ("objectpool_objects_owned", "Objects owned by the pool", metrics.owned_objects),
            ("objectpool_objects_available", "Idle objects ready to rent", metrics.available_objects),
            ("objectpool_objects_rented", "Owned objects rented out", metrics.rented_objects),
            ("objectpool_objects_pending_deletion", "Evicted objects awaiting return", metrics.pending_deletion),
            ("objectpool_max_size", "Current capacity bound", metrics.max_pool_size),
        ];
        for (name, help, value) in gauges {
            Self::write_metric(&mut output, name, help, "gauge", &labels, value.to_string());
        }
        Self::write_metric(
            &mut output,
            "objectpool_utilization",
            "Pool utilization ratio",
            "gauge",
            &labels,
            format!("{:.2}", metrics.utilization),
        );

        let counters = [
            ("objectpool_objects_created_total", "Objects created by the factory", metrics.total_created),
            ("objectpool_objects_rented_total", "Successful rents", metrics.total_rented),
            ("objectpool_objects_returned_total", "Objects returned to the pool", metrics.total_returned),
            ("objectpool_objects_destroyed_total", "Objects torn down", metrics.total_destroyed),
            ("objectpool_events_full_total", "Rent attempts on a full pool", metrics.pool_full_events),
            ("objectpool_reset_failures_total", "Failed reset callbacks", metrics.reset_failures),
            ("objectpool_deferred_destructions_total", "Destructions deferred to return", metrics.deferred_destructions),
        ];
        for (name, help, value) in counters {
            Self::write_metric(&mut output, name, help, "counter", &labels, value.to_string());
        }

        output
    }

    fn write_metric(
        output: &mut String,
        name: &str,
        help: &str,
        kind: &str,
        labels: &str,
        value: String,
    ) {
        output.push_str(&format!("# HELP {name} {help}\n"));
        output.push_str(&format!("# TYPE {name} {kind}\n"));
        output.push_str(&format!("{name}{{{labels}}} {value}\n"));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Point-in-time view of the pool's collections
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Occupancy {
    pub owned: usize,
    pub available: usize,
    pub pending: usize,
    pub max_pool_size: usize,
}

/// Internal metrics tracker
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub created: AtomicUsize,
    pub rented: AtomicUsize,
    pub returned: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub pool_full_events: AtomicUsize,
    pub reset_failures: AtomicUsize,
    pub deferred: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(counter: &AtomicUsize, by: usize) {
        if by > 0 {
            counter.fetch_add(by, Ordering::Relaxed);
        }
    }

    pub fn get_metrics(&self, occupancy: Occupancy) -> PoolMetrics {
        let utilization = if occupancy.max_pool_size > 0 {
            occupancy.owned as f64 / occupancy.max_pool_size as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.created.load(Ordering::Relaxed),
            total_rented: self.rented.load(Ordering::Relaxed),
            total_returned: self.returned.load(Ordering::Relaxed),
            total_destroyed: self.destroyed.load(Ordering::Relaxed),
            pool_full_events: self.pool_full_events.load(Ordering::Relaxed),
            reset_failures: self.reset_failures.load(Ordering::Relaxed),
            deferred_destructions: self.deferred.load(Ordering::Relaxed),
            owned_objects: occupancy.owned,
            available_objects: occupancy.available,
            rented_objects: occupancy.owned - occupancy.available,
            pending_deletion: occupancy.pending,
            max_pool_size: occupancy.max_pool_size,
            utilization,
        }
    }
}

#[cfg(feature = "metrics")]
pub use collector::PoolCollector;

#[cfg(feature = "metrics")]
mod collector {
    use std::sync::Arc;

    use prometheus::core::{Collector, Desc};
    use prometheus::proto::MetricFamily;
    use prometheus::{IntCounter, IntGauge, Opts};

    use crate::pool::ResizablePool;

    /// Prometheus collector reading a pool's metrics on every scrape
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resizable_pool::{PoolCollector, PoolConfiguration, ResizablePool};
    /// use std::sync::Arc;
    ///
    /// let pool = Arc::new(ResizablePool::new(|| 0u8, PoolConfiguration::new()));
    /// let registry = prometheus::Registry::new();
    /// registry
    ///     .register(Box::new(PoolCollector::new(Arc::clone(&pool), "bytes").unwrap()))
    ///     .unwrap();
    ///
    /// let _obj = pool.rent().unwrap();
    /// assert!(!registry.gather().is_empty());
    /// ```
    pub struct PoolCollector<T: Send + Sync + 'static> {
        pool: Arc<ResizablePool<T>>,
        owned: IntGauge,
        available: IntGauge,
        pending: IntGauge,
        max_size: IntGauge,
        created: IntCounter,
        destroyed: IntCounter,
        full_events: IntCounter,
        descs: Vec<Desc>,
    }

    impl<T: Send + Sync + 'static> PoolCollector<T> {
        pub fn new(pool: Arc<ResizablePool<T>>, pool_name: &str) -> prometheus::Result<Self> {
            let opts = |name: &str, help: &str| {
                Opts::new(name, help).const_label("pool", pool_name)
            };

            let owned = IntGauge::with_opts(opts("objectpool_objects_owned", "Objects owned by the pool"))?;
            let available = IntGauge::with_opts(opts("objectpool_objects_available", "Idle objects ready to rent"))?;
            let pending = IntGauge::with_opts(opts("objectpool_objects_pending_deletion", "Evicted objects awaiting return"))?;
            let max_size = IntGauge::with_opts(opts("objectpool_max_size", "Current capacity bound"))?;
            let created = IntCounter::with_opts(opts("objectpool_objects_created_total", "Objects created by the factory"))?;
            let destroyed = IntCounter::with_opts(opts("objectpool_objects_destroyed_total", "Objects torn down"))?;
            let full_events = IntCounter::with_opts(opts("objectpool_events_full_total", "Rent attempts on a full pool"))?;

            let descs = [
                owned.desc(),
                available.desc(),
                pending.desc(),
                max_size.desc(),
                created.desc(),
                destroyed.desc(),
                full_events.desc(),
            ]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

            Ok(Self {
                pool,
                owned,
                available,
                pending,
                max_size,
                created,
                destroyed,
                full_events,
                descs,
            })
        }
    }

    fn catch_up(counter: &IntCounter, total: usize) {
        let total = total as u64;
        let seen = counter.get();
        if total > seen {
            counter.inc_by(total - seen);
        }
    }

    impl<T: Send + Sync + 'static> Collector for PoolCollector<T> {
        fn desc(&self) -> Vec<&Desc> {
            self.descs.iter().collect()
        }

        fn collect(&self) -> Vec<MetricFamily> {
            let metrics = self.pool.get_metrics();
            self.owned.set(metrics.owned_objects as i64);
            self.available.set(metrics.available_objects as i64);
            self.pending.set(metrics.pending_deletion as i64);
            self.max_size.set(metrics.max_pool_size as i64);
            catch_up(&self.created, metrics.total_created);
            catch_up(&self.destroyed, metrics.total_destroyed);
            catch_up(&self.full_events, metrics.pool_full_events);

            let mut families = Vec::new();
            families.extend(self.owned.collect());
            families.extend(self.available.collect());
            families.extend(self.pending.collect());
            families.extend(self.max_size.collect());
            families.extend(self.created.collect());
            families.extend(self.destroyed.collect());
            families.extend(self.full_events.collect());
            families
        }
    }
}
