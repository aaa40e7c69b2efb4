use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::broker::{HandlerError, InboundMessage, MessageHandler};
use crate::events::{EventError, EventMessage, RoutingKey, TripEvent};
use crate::models::trip::{TripDriver, TripOutcome};
use crate::repository::{RepositoryError, TripRepository};

pub struct TripOutcomeRecorder {
    repository: Arc<dyn TripRepository>,
}

impl TripOutcomeRecorder {
    pub fn new(repository: Arc<dyn TripRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl MessageHandler for TripOutcomeRecorder {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let decoded = EventMessage::decode(&message.routing_key, &message.body)?;

        let (trip_id, outcome) = match decoded.event {
            TripEvent::DriverTripRequest(data) => {
                let driver = data
                    .driver
                    .as_ref()
                    .map(TripDriver::from)
                    .ok_or(EventError::MissingDriver(RoutingKey::DriverCmdTripRequest))?;
                (data.trip.id, TripOutcome::DriverAssigned(driver))
            }
            TripEvent::NoDriversFound(data) => (data.trip.id, TripOutcome::NoDriversFound),
            other => return Err(EventError::UnexpectedRoutingKey(other.routing_key()).into()),
        };

        match self.repository.apply_outcome(&trip_id, outcome).await {
            Ok(true) => info!(trip_id = %trip_id, routing_key = %message.routing_key, "trip outcome recorded"),
            Ok(false) => debug!(trip_id = %trip_id, "trip already settled, outcome ignored"),
            // trips created elsewhere are not ours to track
            Err(RepositoryError::TripNotFound(_)) => {
                warn!(trip_id = %trip_id, "outcome for unknown trip")
            }
            Err(err) => warn!(trip_id = %trip_id, error = %err, "failed to record trip outcome"),
        }

        Ok(())
    }
}
