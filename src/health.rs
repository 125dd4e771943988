//! Health monitoring for resizable pools

use crate::metrics::Occupancy;

/// Health status of a pool
///
/// # Examples
///
/// ```
/// use esox_resizable_pool::{PoolConfiguration, ResizablePool};
///
/// let pool = ResizablePool::new(|| 0u32, PoolConfiguration::new().with_max_pool_size(10));
/// let _obj = pool.rent().unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.rented_objects, 1);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Owned objects relative to capacity (0.0 to 1.0)
    pub utilization: f64,

    /// Idle objects
    pub available_objects: usize,

    /// Owned objects rented out
    pub rented_objects: usize,

    /// Evicted objects not yet returned
    pub pending_deletion: usize,

    /// Current capacity bound
    pub max_pool_size: usize,

    /// Whether the pool has been disposed
    pub disposed: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn new(occupancy: Occupancy, disposed: bool) -> Self {
        let utilization = if occupancy.max_pool_size > 0 {
            occupancy.owned as f64 / occupancy.max_pool_size as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if disposed {
            warnings.push("Pool is disposed".to_string());
            is_healthy = false;
        }

        if utilization > 0.9 && occupancy.available == 0 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if occupancy.pending > 0 {
            warnings.push(format!(
                "{} evicted object(s) still rented out",
                occupancy.pending
            ));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            available_objects: occupancy.available,
            rented_objects: occupancy.owned - occupancy.available,
            pending_deletion: occupancy.pending,
            max_pool_size: occupancy.max_pool_size,
            disposed,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
