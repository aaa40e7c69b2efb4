use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::events::{AmqpMessage, EventError, EventMessage, RoutingKey};

pub mod amqp;
pub mod consumer;
pub mod mock;
pub mod topology;

pub use amqp::RabbitMq;
pub use consumer::{Disposition, LoopExit};
pub use mock::MockPublisher;
pub use topology::{QueueBinding, Topology};

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("topology declaration failed: {0}")]
    Topology(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("consume failed: {0}")]
    Consume(String),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("acknowledgement failed: {0}")]
    Acknowledge(String),

    #[error("broker gateway is closed")]
    Closed,

    #[error("failed to encode message: {0}")]
    Encode(#[from] EventError),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed message: {0}")]
    Decode(#[from] EventError),

    #[error("failed to publish follow-up event: {0}")]
    Publish(#[source] BrokerError),
}

impl HandlerError {
    /// Decode failures are dead on arrival; publish failures may get another attempt.
    pub fn requeue(&self) -> bool {
        matches!(self, HandlerError::Publish(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub routing_key: String,
    pub body: Vec<u8>,
    pub redelivered: bool,
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, routing_key: RoutingKey, message: &AmqpMessage) -> Result<()>;

    async fn publish_event(&self, message: &EventMessage) -> Result<()> {
        let envelope = message.encode()?;
        self.publish(message.routing_key(), &envelope).await
    }
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage) -> std::result::Result<(), HandlerError>;
}

#[async_trait]
pub trait Delivery: Send + Sync {
    fn take_message(&mut self) -> InboundMessage;

    async fn ack(&self) -> Result<()>;

    async fn nack(&self, requeue: bool) -> Result<()>;
}
