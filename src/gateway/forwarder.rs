use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::broker::{HandlerError, InboundMessage, MessageHandler};
use crate::events::{EventError, EventMessage, RoutingKey};
use crate::gateway::connections::{ConnectionManager, Role, WsMessage};

pub struct NotificationForwarder {
    connections: Arc<ConnectionManager>,
}

impl NotificationForwarder {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }
}

#[async_trait]
impl MessageHandler for NotificationForwarder {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let decoded = EventMessage::decode(&message.routing_key, &message.body)?;
        let data = serde_json::to_value(decoded.event.data()).map_err(EventError::from)?;
        let routing_key = decoded.routing_key();
        let frame = WsMessage::new(routing_key.as_str(), data);

        // an offline owner is not worth a redelivery
        match self
            .connections
            .send(recipient_role(routing_key), &decoded.owner_id, frame)
        {
            Ok(()) => debug!(
                owner_id = %decoded.owner_id,
                routing_key = %message.routing_key,
                "notification forwarded"
            ),
            Err(err) => warn!(
                owner_id = %decoded.owner_id,
                routing_key = %message.routing_key,
                error = %err,
                "dropping notification"
            ),
        }

        Ok(())
    }
}

fn recipient_role(routing_key: RoutingKey) -> Role {
    match routing_key {
        RoutingKey::DriverCmdTripRequest => Role::Driver,
        _ => Role::Rider,
    }
}
