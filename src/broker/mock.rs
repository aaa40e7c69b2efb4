use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::broker::{BrokerError, EventPublisher, InboundMessage, Result};
use crate::events::{AmqpMessage, EventMessage, RoutingKey};

#[derive(Default)]
pub struct MockPublisher {
    published: RwLock<Vec<(RoutingKey, AmqpMessage)>>,
    fail_on_publish: RwLock<bool>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    pub async fn published_count(&self) -> usize {
        self.published.read().await.len()
    }

    pub async fn take_published(&self) -> Vec<(RoutingKey, AmqpMessage)> {
        std::mem::take(&mut *self.published.write().await)
    }

    pub async fn take_events(&self) -> Vec<EventMessage> {
        self.take_published()
            .await
            .into_iter()
            .filter_map(|(key, envelope)| {
                let body = serde_json::to_vec(&envelope).ok()?;
                EventMessage::decode(key.as_str(), &body).ok()
            })
            .collect()
    }

    pub async fn take_inbound(&self) -> Vec<InboundMessage> {
        self.take_published()
            .await
            .into_iter()
            .filter_map(|(key, envelope)| {
                Some(InboundMessage {
                    routing_key: key.as_str().to_string(),
                    body: serde_json::to_vec(&envelope).ok()?,
                    redelivered: false,
                })
            })
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MockPublisher {
    async fn publish(&self, routing_key: RoutingKey, message: &AmqpMessage) -> Result<()> {
        if *self.fail_on_publish.read().await {
            return Err(BrokerError::Publish("mock publish failure".to_string()));
        }
        self.published
            .write()
            .await
            .push((routing_key, message.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::MockPublisher;
    use crate::broker::EventPublisher;
    use crate::events::{AmqpMessage, RoutingKey};

    fn envelope() -> AmqpMessage {
        AmqpMessage {
            owner_id: "rider-1".to_string(),
            data: json!({}),
        }
    }

    #[tokio::test]
    async fn records_published_messages() {
        let publisher = MockPublisher::new();
        publisher
            .publish(RoutingKey::TripNoDriversFound, &envelope())
            .await
            .unwrap();

        assert_eq!(publisher.published_count().await, 1);
        let published = publisher.take_published().await;
        assert_eq!(published[0].0, RoutingKey::TripNoDriversFound);
        assert_eq!(publisher.published_count().await, 0);
    }

    #[tokio::test]
    async fn fail_on_publish_returns_error() {
        let publisher = MockPublisher::new();
        publisher.set_fail_on_publish(true).await;

        let result = publisher
            .publish(RoutingKey::TripCreated, &envelope())
            .await;

        assert!(result.is_err());
        assert_eq!(publisher.published_count().await, 0);
    }
}
