use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::broker::EventPublisher;
use crate::error::AppError;
use crate::events::{EventMessage, TripEvent, TripEventData};
use crate::fare::{PricingConfig, estimate_fares};
use crate::models::route::{Coordinate, Route};
use crate::models::trip::{RideFare, Trip};
use crate::repository::TripRepository;
use crate::routing::{RouteProvider, RoutingError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripPreview {
    pub route: Route,
    pub ride_fares: Vec<RideFare>,
}

pub struct TripService {
    repository: Arc<dyn TripRepository>,
    routes: Arc<dyn RouteProvider>,
    publisher: Arc<dyn EventPublisher>,
    pricing: PricingConfig,
    routing_timeout: Duration,
}

impl TripService {
    pub fn new(
        repository: Arc<dyn TripRepository>,
        routes: Arc<dyn RouteProvider>,
        publisher: Arc<dyn EventPublisher>,
        routing_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            routes,
            publisher,
            pricing: PricingConfig::default(),
            routing_timeout,
        }
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    pub async fn preview(
        &self,
        user_id: &str,
        pickup: Coordinate,
        destination: Coordinate,
    ) -> Result<TripPreview, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::BadRequest("user id cannot be empty".to_string()));
        }
        if !pickup.is_valid() || !destination.is_valid() {
            return Err(AppError::BadRequest(
                "pickup and destination must be valid coordinates".to_string(),
            ));
        }

        let route = tokio::time::timeout(self.routing_timeout, self.routes.route(&pickup, &destination))
            .await
            .map_err(|_| RoutingError::Timeout(self.routing_timeout))??;

        let mut ride_fares = Vec::new();
        for estimate in estimate_fares(&route, &self.pricing) {
            let fare = RideFare {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                package_slug: estimate.package_slug,
                total_price_in_cents: estimate.total_price_in_cents,
                route: None,
            };
            self.repository
                .save_ride_fare(RideFare {
                    route: Some(route.clone()),
                    ..fare.clone()
                })
                .await?;
            ride_fares.push(fare);
        }

        info!(
            user_id,
            distance_m = route.distance,
            duration_s = route.duration,
            fares = ride_fares.len(),
            "trip previewed"
        );

        Ok(TripPreview { route, ride_fares })
    }

    pub async fn create(&self, ride_fare_id: &str, user_id: &str) -> Result<Trip, AppError> {
        if ride_fare_id.trim().is_empty() || user_id.trim().is_empty() {
            return Err(AppError::BadRequest(
                "ride fare id and user id are required".to_string(),
            ));
        }

        let fare = self.repository.get_ride_fare(ride_fare_id).await?;
        if fare.user_id != user_id {
            return Err(AppError::Forbidden(format!(
                "ride fare {ride_fare_id} does not belong to user {user_id}"
            )));
        }

        let trip = self
            .repository
            .create_trip(Trip::pending(Uuid::new_v4().to_string(), fare))
            .await?;

        let message = EventMessage::new(
            trip.user_id.clone(),
            TripEvent::Created(TripEventData::new(trip.clone())),
        );
        self.publisher.publish_event(&message).await.map_err(|err| {
            warn!(trip_id = %trip.id, error = %err, "failed to publish trip created event");
            AppError::from(err)
        })?;

        info!(
            trip_id = %trip.id,
            user_id,
            package = %trip.package_slug(),
            "trip created"
        );
        Ok(trip)
    }

    pub async fn get(&self, trip_id: &str) -> Result<Trip, AppError> {
        Ok(self.repository.get_trip(trip_id).await?)
    }

    /// Re-enters dispatch for a trip the driver turned down. Only the driver
    /// the trip is assigned to may decline it.
    pub async fn decline(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError> {
        let trip = self
            .repository
            .release_driver(trip_id, driver_id)
            .await?
            .ok_or_else(|| {
                AppError::Forbidden(format!("trip {trip_id} is not assigned to driver {driver_id}"))
            })?;

        let message = EventMessage::new(
            trip.user_id.clone(),
            TripEvent::DriverNotInterested(TripEventData::new(trip.clone())),
        );
        self.publisher.publish_event(&message).await?;

        info!(trip_id, driver_id, "driver declined trip");
        Ok(trip)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::TripService;
    use crate::broker::MockPublisher;
    use crate::error::AppError;
    use crate::events::{RoutingKey, TripEvent};
    use crate::fare::{CAR_PACKAGES, PricingConfig};
    use crate::models::route::{Coordinate, Route};
    use crate::models::trip::{TripDriver, TripOutcome, TripStatus};
    use crate::repository::{InMemoryTripRepository, TripRepository};
    use crate::routing::{RouteProvider, RoutingError, StraightLineRouteProvider};

    struct StalledRouteProvider;

    #[async_trait]
    impl RouteProvider for StalledRouteProvider {
        async fn route(&self, _: &Coordinate, _: &Coordinate) -> Result<Route, RoutingError> {
            std::future::pending().await
        }
    }

    fn pickup() -> Coordinate {
        Coordinate::new(37.7749, -122.4194)
    }

    fn destination() -> Coordinate {
        Coordinate::new(37.7849, -122.4094)
    }

    fn service() -> (TripService, Arc<InMemoryTripRepository>, Arc<MockPublisher>) {
        let repository = Arc::new(InMemoryTripRepository::new());
        let publisher = Arc::new(MockPublisher::new());
        let trips = TripService::new(
            repository.clone(),
            Arc::new(StraightLineRouteProvider::default()),
            publisher.clone(),
            Duration::from_secs(1),
        );
        (trips, repository, publisher)
    }

    #[tokio::test]
    async fn preview_stores_one_fare_per_package() {
        let (trips, repository, _) = service();

        let preview = trips.preview("rider-1", pickup(), destination()).await.unwrap();

        assert_eq!(preview.ride_fares.len(), 4);
        assert!(preview.route.distance > 0.0);
        for fare in &preview.ride_fares {
            let stored = repository.get_ride_fare(&fare.id).await.unwrap();
            assert_eq!(stored.user_id, "rider-1");
            assert_eq!(stored.route.as_ref(), Some(&preview.route));
        }
    }

    #[tokio::test]
    async fn preview_uses_configured_rates() {
        let (trips, _, _) = service();
        let trips = trips.with_pricing(PricingConfig {
            price_per_km_in_cents: 0.0,
            price_per_minute_in_cents: 0.0,
        });

        let preview = trips.preview("rider-1", pickup(), destination()).await.unwrap();

        for fare in &preview.ride_fares {
            let package = CAR_PACKAGES
                .iter()
                .find(|package| package.slug == fare.package_slug)
                .unwrap();
            assert_eq!(fare.total_price_in_cents, package.base_price_in_cents);
        }
    }

    #[tokio::test]
    async fn preview_rejects_invalid_coordinates() {
        let (trips, _, _) = service();
        let result = trips
            .preview("rider-1", Coordinate::new(123.0, 0.0), destination())
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn slow_route_provider_times_out() {
        let trips = TripService::new(
            Arc::new(InMemoryTripRepository::new()),
            Arc::new(StalledRouteProvider),
            Arc::new(MockPublisher::new()),
            Duration::from_millis(20),
        );

        let result = trips.preview("rider-1", pickup(), destination()).await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }

    #[tokio::test]
    async fn create_persists_pending_trip_and_publishes_created() {
        let (trips, repository, publisher) = service();
        let preview = trips.preview("rider-1", pickup(), destination()).await.unwrap();
        let fare = &preview.ride_fares[1];

        let trip = trips.create(&fare.id, "rider-1").await.unwrap();

        assert_eq!(trip.status, TripStatus::Pending);
        assert_eq!(trip.package_slug(), fare.package_slug);
        assert_eq!(repository.get_trip(&trip.id).await.unwrap(), trip);

        let events = publisher.take_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].owner_id, "rider-1");
        match &events[0].event {
            TripEvent::Created(data) => {
                assert_eq!(data.trip.id, trip.id);
                assert_eq!(data.trip.selected_fare.id, fare.id);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_rejects_fare_of_another_user() {
        let (trips, repository, publisher) = service();
        let preview = trips.preview("rider-1", pickup(), destination()).await.unwrap();

        let result = trips.create(&preview.ride_fares[0].id, "rider-2").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(repository.trip_count().await, 0);
        assert_eq!(publisher.published_count().await, 0);
    }

    #[tokio::test]
    async fn create_with_unknown_fare_is_not_found() {
        let (trips, _, _) = service();
        let result = trips.create("missing", "rider-1").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_publish_surfaces_as_internal_error() {
        let (trips, _, publisher) = service();
        let preview = trips.preview("rider-1", pickup(), destination()).await.unwrap();
        publisher.set_fail_on_publish(true).await;

        let result = trips.create(&preview.ride_fares[0].id, "rider-1").await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    async fn assigned_trip(
        trips: &TripService,
        repository: &InMemoryTripRepository,
        driver_id: &str,
    ) -> String {
        let preview = trips.preview("rider-1", pickup(), destination()).await.unwrap();
        let trip = trips.create(&preview.ride_fares[0].id, "rider-1").await.unwrap();
        repository
            .apply_outcome(
                &trip.id,
                TripOutcome::DriverAssigned(TripDriver {
                    id: driver_id.to_string(),
                    name: String::new(),
                    profile_picture: String::new(),
                    car_plate: String::new(),
                }),
            )
            .await
            .unwrap();
        trip.id
    }

    #[tokio::test]
    async fn decline_by_assigned_driver_republishes_stored_trip() {
        let (trips, repository, publisher) = service();
        let trip_id = assigned_trip(&trips, &repository, "driver-1").await;
        publisher.take_published().await;

        let released = trips.decline("driver-1", &trip_id).await.unwrap();
        assert_eq!(released.status, TripStatus::Pending);

        let events = publisher.take_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].routing_key(), RoutingKey::TripDriverNotInterested);
        assert_eq!(events[0].owner_id, "rider-1");
        assert_eq!(events[0].event.data().trip.id, trip_id);
    }

    #[tokio::test]
    async fn decline_by_another_driver_is_forbidden() {
        let (trips, repository, publisher) = service();
        let trip_id = assigned_trip(&trips, &repository, "driver-1").await;
        publisher.take_published().await;

        let result = trips.decline("driver-2", &trip_id).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(publisher.published_count().await, 0);
        assert_eq!(
            repository.get_trip(&trip_id).await.unwrap().status,
            TripStatus::DriverAssigned
        );
    }

    #[tokio::test]
    async fn decline_of_unknown_trip_publishes_nothing() {
        let (trips, _, publisher) = service();

        let result = trips.decline("driver-1", "never-created").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(publisher.published_count().await, 0);
    }
}
