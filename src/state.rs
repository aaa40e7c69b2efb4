use std::sync::Arc;
use std::time::Duration;

use crate::broker::EventPublisher;
use crate::dispatch::TripDispatcher;
use crate::fare::PricingConfig;
use crate::gateway::{ConnectionManager, NotificationForwarder};
use crate::observability::metrics::Metrics;
use crate::registry::DriverRegistry;
use crate::repository::{InMemoryTripRepository, TripRepository};
use crate::routing::RouteProvider;
use crate::service::{DriverService, TripOutcomeRecorder, TripService};

pub struct AppState {
    pub registry: Arc<DriverRegistry>,
    pub drivers: DriverService,
    pub trips: TripService,
    pub repository: Arc<dyn TripRepository>,
    pub connections: Arc<ConnectionManager>,
    pub publisher: Arc<dyn EventPublisher>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        routes: Arc<dyn RouteProvider>,
        routing_timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        let registry = Arc::new(DriverRegistry::new());
        let repository: Arc<dyn TripRepository> = Arc::new(InMemoryTripRepository::new());

        Self {
            drivers: DriverService::new(registry.clone(), metrics.clone()),
            trips: TripService::new(
                repository.clone(),
                routes,
                publisher.clone(),
                routing_timeout,
            ),
            registry,
            repository,
            connections: Arc::new(ConnectionManager::new()),
            publisher,
            metrics,
        }
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.trips = self.trips.with_pricing(pricing);
        self
    }

    pub fn dispatcher(&self) -> TripDispatcher {
        TripDispatcher::new(
            self.registry.clone(),
            self.publisher.clone(),
            self.metrics.clone(),
        )
    }

    pub fn forwarder(&self) -> NotificationForwarder {
        NotificationForwarder::new(self.connections.clone())
    }

    pub fn outcome_recorder(&self) -> TripOutcomeRecorder {
        TripOutcomeRecorder::new(self.repository.clone())
    }
}
