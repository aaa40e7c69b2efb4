//! Matches created and declined trips to the first driver serving their package.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::broker::{EventPublisher, HandlerError, InboundMessage, MessageHandler};
use crate::events::{EventError, EventMessage, TripEvent, TripEventData};
use crate::observability::metrics::Metrics;
use crate::registry::DriverRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    DriverFound { driver_id: String },
    NoDriversFound,
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::DriverFound { .. } => "driver_found",
            DispatchOutcome::NoDriversFound => "no_drivers_found",
        }
    }
}

pub struct TripDispatcher {
    registry: Arc<DriverRegistry>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Metrics,
}

impl TripDispatcher {
    pub fn new(
        registry: Arc<DriverRegistry>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Metrics,
    ) -> Self {
        Self {
            registry,
            publisher,
            metrics,
        }
    }

    /// Matches one trip and publishes the outcome event.
    pub async fn dispatch(&self, data: TripEventData) -> Result<DispatchOutcome, HandlerError> {
        let start = Instant::now();
        let trip_id = data.trip.id.clone();
        let candidates = self.registry.available_drivers(data.trip.package_slug());

        info!(
            trip_id = %trip_id,
            package = %data.trip.package_slug(),
            candidates = candidates.len(),
            "matching trip"
        );

        let (outcome, message) = match candidates.into_iter().next() {
            Some(driver) => {
                let driver_id = driver.id.clone();
                let data = TripEventData {
                    driver: Some(driver),
                    ..data
                };
                (
                    DispatchOutcome::DriverFound {
                        driver_id: driver_id.clone(),
                    },
                    EventMessage::new(driver_id, TripEvent::DriverTripRequest(data)),
                )
            }
            None => {
                let rider_id = data.trip.user_id.clone();
                (
                    DispatchOutcome::NoDriversFound,
                    EventMessage::new(rider_id, TripEvent::NoDriversFound(data)),
                )
            }
        };

        if let Err(err) = self.publisher.publish_event(&message).await {
            warn!(
                trip_id = %trip_id,
                routing_key = %message.routing_key(),
                error = %err,
                "failed to publish dispatch outcome"
            );
            self.observe("publish_failed", start);
            return Err(HandlerError::Publish(err));
        }

        self.observe(outcome.label(), start);
        info!(
            trip_id = %trip_id,
            owner_id = %message.owner_id,
            routing_key = %message.routing_key(),
            "dispatch outcome published"
        );

        Ok(outcome)
    }

    fn observe(&self, outcome: &str, start: Instant) {
        self.metrics
            .dispatch_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .dispatch_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }
}

#[async_trait]
impl MessageHandler for TripDispatcher {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let decoded = EventMessage::decode(&message.routing_key, &message.body)?;

        match decoded.event {
            TripEvent::Created(data) | TripEvent::DriverNotInterested(data) => {
                self.dispatch(data).await.map(|_| ())
            }
            other => Err(EventError::UnexpectedRoutingKey(other.routing_key()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{DispatchOutcome, TripDispatcher};
    use crate::broker::{HandlerError, InboundMessage, MessageHandler, MockPublisher};
    use crate::events::{EventMessage, RoutingKey, TripEvent, TripEventData};
    use crate::models::trip::{RideFare, Trip};
    use crate::observability::metrics::Metrics;
    use crate::registry::DriverRegistry;

    fn trip(user_id: &str, package_slug: &str) -> Trip {
        Trip::pending(
            "trip-1".to_string(),
            RideFare {
                id: "fare-1".to_string(),
                user_id: user_id.to_string(),
                package_slug: package_slug.to_string(),
                total_price_in_cents: 1500.0,
                route: None,
            },
        )
    }

    fn created(trip: Trip) -> InboundMessage {
        inbound(RoutingKey::TripCreated, trip)
    }

    fn inbound(key: RoutingKey, trip: Trip) -> InboundMessage {
        let owner = trip.user_id.clone();
        let event = match key {
            RoutingKey::TripCreated => TripEvent::Created(TripEventData::new(trip)),
            RoutingKey::TripDriverNotInterested => {
                TripEvent::DriverNotInterested(TripEventData::new(trip))
            }
            RoutingKey::TripNoDriversFound => TripEvent::NoDriversFound(TripEventData::new(trip)),
            RoutingKey::DriverCmdTripRequest => {
                TripEvent::DriverTripRequest(TripEventData::new(trip))
            }
        };
        let envelope = EventMessage::new(owner, event).encode().unwrap();
        InboundMessage {
            routing_key: key.as_str().to_string(),
            body: serde_json::to_vec(&envelope).unwrap(),
            redelivered: false,
        }
    }

    fn setup() -> (Arc<DriverRegistry>, Arc<MockPublisher>, TripDispatcher) {
        let registry = Arc::new(DriverRegistry::new());
        let publisher = Arc::new(MockPublisher::new());
        let dispatcher = TripDispatcher::new(registry.clone(), publisher.clone(), Metrics::new());
        (registry, publisher, dispatcher)
    }

    #[tokio::test]
    async fn matching_driver_receives_trip_request() {
        let (registry, publisher, dispatcher) = setup();
        registry.register("D1", "suv");

        dispatcher.handle(&created(trip("U1", "suv"))).await.unwrap();

        let events = publisher.take_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].owner_id, "D1");
        assert_eq!(events[0].routing_key(), RoutingKey::DriverCmdTripRequest);
        assert_eq!(events[0].event.data().trip, trip("U1", "suv"));
        assert_eq!(
            events[0].event.data().driver.as_ref().map(|d| d.id.as_str()),
            Some("D1")
        );
    }

    #[tokio::test]
    async fn no_drivers_for_package_notifies_rider() {
        let (registry, publisher, dispatcher) = setup();
        registry.register("D1", "suv");

        dispatcher.handle(&created(trip("U1", "luxury"))).await.unwrap();

        let published = publisher.take_published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, RoutingKey::TripNoDriversFound);
        assert_eq!(published[0].1.owner_id, "U1");
    }

    #[tokio::test]
    async fn first_registered_driver_wins() {
        let (registry, publisher, dispatcher) = setup();
        registry.register("D1", "sedan");
        registry.register("D2", "sedan");

        let outcome = dispatcher
            .dispatch(TripEventData::new(trip("U1", "sedan")))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::DriverFound {
                driver_id: "D1".to_string()
            }
        );
        let events = publisher.take_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].owner_id, "D1");
    }

    #[tokio::test]
    async fn driver_not_interested_is_dispatched_like_a_new_trip() {
        let (registry, publisher, dispatcher) = setup();
        registry.register("D1", "van");

        dispatcher
            .handle(&inbound(RoutingKey::TripDriverNotInterested, trip("U1", "van")))
            .await
            .unwrap();

        let events = publisher.take_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].routing_key(), RoutingKey::DriverCmdTripRequest);
    }

    #[tokio::test]
    async fn unregistered_driver_is_not_dispatched_to() {
        let (registry, publisher, dispatcher) = setup();
        registry.register("D1", "suv");
        registry.unregister("D1");

        let outcome = dispatcher
            .dispatch(TripEventData::new(trip("U1", "suv")))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::NoDriversFound);
        assert_eq!(publisher.published_count().await, 1);
    }

    #[tokio::test]
    async fn malformed_message_is_a_decode_error() {
        let (_registry, publisher, dispatcher) = setup();

        let err = dispatcher
            .handle(&InboundMessage {
                routing_key: "trip.created".to_string(),
                body: b"{\"ownerID\":\"U1\",\"data\":{}}".to_vec(),
                redelivered: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Decode(_)));
        assert!(!err.requeue());
        assert_eq!(publisher.published_count().await, 0);
    }

    #[tokio::test]
    async fn outcome_event_delivered_to_dispatcher_is_rejected() {
        let (_registry, _publisher, dispatcher) = setup();

        let err = dispatcher
            .handle(&inbound(RoutingKey::TripNoDriversFound, trip("U1", "suv")))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Decode(_)));
    }

    #[tokio::test]
    async fn failed_outcome_publish_is_requeued() {
        let (registry, publisher, dispatcher) = setup();
        registry.register("D1", "suv");
        publisher.set_fail_on_publish(true).await;

        let err = dispatcher
            .handle(&created(trip("U1", "suv")))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Publish(_)));
        assert!(err.requeue());
    }
}
