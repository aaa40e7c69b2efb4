use std::sync::Arc;

use tracing::info;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::observability::metrics::Metrics;
use crate::registry::DriverRegistry;

pub struct DriverService {
    registry: Arc<DriverRegistry>,
    metrics: Metrics,
}

impl DriverService {
    pub fn new(registry: Arc<DriverRegistry>, metrics: Metrics) -> Self {
        Self { registry, metrics }
    }

    pub fn register(&self, driver_id: &str, package_slug: &str) -> Result<Driver, AppError> {
        if driver_id.trim().is_empty() {
            return Err(AppError::BadRequest("driver id cannot be empty".to_string()));
        }
        if package_slug.trim().is_empty() {
            return Err(AppError::BadRequest("package slug cannot be empty".to_string()));
        }

        let driver = self.registry.register(driver_id, package_slug);
        self.metrics.drivers_online.set(self.registry.len() as i64);

        info!(
            driver_id = %driver.id,
            package = %driver.package_slug,
            geohash = %driver.geohash,
            "driver registered"
        );
        Ok(driver)
    }

    pub fn unregister(&self, driver_id: &str) -> Option<Driver> {
        let removed = self.registry.unregister(driver_id);
        self.metrics.drivers_online.set(self.registry.len() as i64);

        if removed.is_some() {
            info!(driver_id, "driver unregistered");
        }
        removed
    }

    pub fn online(&self) -> usize {
        self.registry.len()
    }
}
