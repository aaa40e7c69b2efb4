use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::models::trip::{RideFare, Trip, TripOutcome};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("ride fare {0} not found")]
    FareNotFound(String),

    #[error("trip {0} not found")]
    TripNotFound(String),
}

#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn save_ride_fare(&self, fare: RideFare) -> Result<(), RepositoryError>;

    async fn get_ride_fare(&self, fare_id: &str) -> Result<RideFare, RepositoryError>;

    async fn create_trip(&self, trip: Trip) -> Result<Trip, RepositoryError>;

    async fn get_trip(&self, trip_id: &str) -> Result<Trip, RepositoryError>;

    async fn apply_outcome(&self, trip_id: &str, outcome: TripOutcome) -> Result<bool, RepositoryError>;

    /// Returns the trip to `pending` if it is assigned to `driver_id`.
    /// `None` means the trip is not assigned to that driver.
    async fn release_driver(
        &self,
        trip_id: &str,
        driver_id: &str,
    ) -> Result<Option<Trip>, RepositoryError>;

    async fn trip_count(&self) -> usize;
}

#[derive(Default)]
pub struct InMemoryTripRepository {
    trips: DashMap<String, Trip>,
    ride_fares: DashMap<String, RideFare>,
}

impl InMemoryTripRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripRepository for InMemoryTripRepository {
    async fn save_ride_fare(&self, fare: RideFare) -> Result<(), RepositoryError> {
        self.ride_fares.insert(fare.id.clone(), fare);
        Ok(())
    }

    async fn get_ride_fare(&self, fare_id: &str) -> Result<RideFare, RepositoryError> {
        self.ride_fares
            .get(fare_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RepositoryError::FareNotFound(fare_id.to_string()))
    }

    async fn create_trip(&self, trip: Trip) -> Result<Trip, RepositoryError> {
        self.trips.insert(trip.id.clone(), trip.clone());
        Ok(trip)
    }

    async fn get_trip(&self, trip_id: &str) -> Result<Trip, RepositoryError> {
        self.trips
            .get(trip_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RepositoryError::TripNotFound(trip_id.to_string()))
    }

    async fn apply_outcome(&self, trip_id: &str, outcome: TripOutcome) -> Result<bool, RepositoryError> {
        let mut trip = self
            .trips
            .get_mut(trip_id)
            .ok_or_else(|| RepositoryError::TripNotFound(trip_id.to_string()))?;
        Ok(trip.apply(outcome))
    }

    async fn release_driver(
        &self,
        trip_id: &str,
        driver_id: &str,
    ) -> Result<Option<Trip>, RepositoryError> {
        let mut trip = self
            .trips
            .get_mut(trip_id)
            .ok_or_else(|| RepositoryError::TripNotFound(trip_id.to_string()))?;
        Ok(trip.release(driver_id).then(|| trip.value().clone()))
    }

    async fn trip_count(&self) -> usize {
        self.trips.len()
    }
}
