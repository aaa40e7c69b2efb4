pub mod placement;

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::Rng;

use crate::models::driver::Driver;

struct RegisteredDriver {
    sequence: u64,
    driver: Driver,
}

#[derive(Default)]
pub struct DriverRegistry {
    drivers: DashMap<String, RegisteredDriver>,
    next_sequence: AtomicU64,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, driver_id: &str, package_slug: &str) -> Driver {
        self.register_with_rng(driver_id, package_slug, &mut rand::thread_rng())
    }

    pub fn register_with_rng<R: Rng + ?Sized>(
        &self,
        driver_id: &str,
        package_slug: &str,
        rng: &mut R,
    ) -> Driver {
        let driver = placement::place_driver(driver_id, package_slug, rng);
        self.upsert(driver.clone());
        driver
    }

    /// Inserts `driver`, or replaces the entry with the same id in place.
    /// A replaced entry keeps its original registration order.
    pub fn upsert(&self, driver: Driver) {
        match self.drivers.entry(driver.id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().driver = driver;
            }
            Entry::Vacant(entry) => {
                let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
                entry.insert(RegisteredDriver { sequence, driver });
            }
        }
    }

    pub fn unregister(&self, driver_id: &str) -> Option<Driver> {
        self.drivers
            .remove(driver_id)
            .map(|(_, registered)| registered.driver)
    }

    pub fn find_available(&self, package_slug: &str) -> Vec<String> {
        self.available_drivers(package_slug)
            .into_iter()
            .map(|driver| driver.id)
            .collect()
    }

    /// Snapshot of the drivers serving `package_slug`, earliest registration first.
    pub fn available_drivers(&self, package_slug: &str) -> Vec<Driver> {
        let mut matches: Vec<(u64, Driver)> = self
            .drivers
            .iter()
            .filter(|entry| entry.value().driver.package_slug == package_slug)
            .map(|entry| (entry.value().sequence, entry.value().driver.clone()))
            .collect();

        matches.sort_unstable_by_key(|(sequence, _)| *sequence);
        matches.into_iter().map(|(_, driver)| driver).collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
