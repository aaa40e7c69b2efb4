use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::consumer::{self, LoopExit};
use crate::broker::{
    BrokerError, Delivery, EventPublisher, InboundMessage, MessageHandler, Result, Topology,
};
use crate::events::{AmqpMessage, RoutingKey};
use crate::observability::metrics::Metrics;

const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
const PREFETCH_COUNT: u16 = 1;
const REPLY_SUCCESS: u16 = 200;

struct Session {
    connection: Connection,
    channel: Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repair {
    Nothing,
    Channel,
    Connection,
}

impl Repair {
    fn needed(connection_up: bool, channel_up: bool) -> Self {
        match (connection_up, channel_up) {
            (true, true) => Repair::Nothing,
            (true, false) => Repair::Channel,
            (false, _) => Repair::Connection,
        }
    }
}

pub struct RabbitMq {
    uri: String,
    topology: Topology,
    session: RwLock<Session>,
    closed: AtomicBool,
    publish_timeout: Duration,
    metrics: Metrics,
}

impl RabbitMq {
    pub async fn connect(uri: &str, topology: Topology, metrics: Metrics) -> Result<Self> {
        let session = Self::open_session(uri).await?;

        info!(exchange = %topology.exchange, "connected to rabbitmq");

        Ok(Self {
            uri: uri.to_string(),
            topology,
            session: RwLock::new(session),
            closed: AtomicBool::new(false),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            metrics,
        })
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn open_session(uri: &str) -> Result<Session> {
        let connection = Connection::connect(
            uri,
            ConnectionProperties::default().with_connection_name("ride-dispatch".into()),
        )
        .await
        .map_err(|err| BrokerError::Connection(format!("failed to connect to rabbitmq: {err}")))?;

        let channel = Self::open_channel(&connection).await?;

        Ok(Session {
            connection,
            channel,
        })
    }

    async fn open_channel(connection: &Connection) -> Result<Channel> {
        let channel = connection
            .create_channel()
            .await
            .map_err(|err| BrokerError::Connection(format!("failed to create channel: {err}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|err| {
                BrokerError::Connection(format!("failed to enable publisher confirms: {err}"))
            })?;

        Ok(channel)
    }

    pub async fn declare_topology(&self) -> Result<()> {
        let channel = self.session.read().await.channel.clone();
        Self::declare_on(&channel, &self.topology).await
    }

    async fn declare_on(channel: &Channel, topology: &Topology) -> Result<()> {
        channel
            .exchange_declare(
                &topology.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| {
                BrokerError::Topology(format!(
                    "failed to declare exchange {}: {err}",
                    topology.exchange
                ))
            })?;

        for binding in &topology.queues {
            channel
                .queue_declare(
                    &binding.queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|err| {
                    BrokerError::Topology(format!("failed to declare queue {}: {err}", binding.queue))
                })?;

            for routing_key in &binding.routing_keys {
                channel
                    .queue_bind(
                        &binding.queue,
                        &topology.exchange,
                        routing_key.as_str(),
                        QueueBindOptions::default(),
                        FieldTable::default(),
                    )
                    .await
                    .map_err(|err| {
                        BrokerError::Topology(format!(
                            "failed to bind queue {} to {routing_key}: {err}",
                            binding.queue
                        ))
                    })?;
            }

            debug!(queue = %binding.queue, bindings = binding.routing_keys.len(), "queue declared");
        }

        Ok(())
    }

    async fn reconnect_if_needed(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }

        let mut session = self.session.write().await;
        let repair = Repair::needed(
            session.connection.status().connected(),
            session.channel.status().connected(),
        );

        match repair {
            Repair::Nothing => {}
            Repair::Channel => {
                session.channel = Self::open_channel(&session.connection).await?;
                info!("reopened rabbitmq channel");
            }
            Repair::Connection => {
                let fresh = Self::open_session(&self.uri).await?;
                Self::declare_on(&fresh.channel, &self.topology).await?;
                *session = fresh;
                info!("reconnected to rabbitmq");
            }
        }
        Ok(())
    }

    async fn publish_channel(&self) -> Result<Channel> {
        let channel = self.session.read().await.channel.clone();
        if channel.status().connected() {
            return Ok(channel);
        }

        self.reconnect_if_needed().await?;
        Ok(self.session.read().await.channel.clone())
    }

    async fn start_consumer(&self, queue: &str, consumer_tag: &str) -> Result<lapin::Consumer> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }

        let channel = self
            .session
            .read()
            .await
            .connection
            .create_channel()
            .await
            .map_err(|err| BrokerError::Consume(format!("failed to create channel: {err}")))?;

        // fair dispatch
        channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await
            .map_err(|err| BrokerError::Consume(format!("failed to set qos: {err}")))?;

        channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| BrokerError::Consume(format!("failed to consume {queue}: {err}")))
    }

    /// Starts a supervised delivery loop on `queue`. The first subscription
    /// happens before this returns, so startup sees a missing queue.
    pub async fn consume(
        self: &Arc<Self>,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>> {
        let consumer_tag = format!("{queue}-{}", Uuid::new_v4().simple());
        let first = self.start_consumer(queue, &consumer_tag).await?;

        info!(queue, consumer_tag = %consumer_tag, "consumer started");

        let gateway = Arc::clone(self);
        let queue = queue.to_string();
        Ok(tokio::spawn(async move {
            gateway
                .supervise(queue, consumer_tag, first, handler, shutdown)
                .await;
        }))
    }

    async fn supervise(
        &self,
        queue: String,
        consumer_tag: String,
        first: lapin::Consumer,
        handler: Arc<dyn MessageHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let backoff_builder = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(30))
            .with_jitter();
        let mut backoff = backoff_builder.build();
        let mut next_consumer = Some(first);

        loop {
            let subscribed = match next_consumer.take() {
                Some(consumer) => Ok(consumer),
                None => self.start_consumer(&queue, &consumer_tag).await,
            };

            match subscribed {
                Ok(deliveries) => {
                    backoff = backoff_builder.build();
                    let exit = consumer::drain(
                        &queue,
                        deliveries,
                        handler.as_ref(),
                        &self.metrics,
                        &mut shutdown,
                    )
                    .await;

                    if exit == LoopExit::Shutdown || self.is_closed() {
                        break;
                    }
                    warn!(queue = %queue, exit = ?exit, "delivery stream ended, reconnecting");
                }
                Err(BrokerError::Closed) => break,
                Err(err) => {
                    error!(queue = %queue, error = %err, "failed to resubscribe");
                }
            }

            let delay = backoff.next().unwrap_or(Duration::from_secs(30));
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }

            if let Err(err) = self.reconnect_if_needed().await {
                error!(queue = %queue, backoff_ms = delay.as_millis() as u64, error = %err, "reconnect failed");
            }
        }

        info!(queue = %queue, "consumer stopped");
    }

    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let session = self.session.read().await;
        if let Err(err) = session.channel.close(REPLY_SUCCESS, "shutdown").await {
            debug!(error = %err, "error closing channel");
        }
        if let Err(err) = session.connection.close(REPLY_SUCCESS, "shutdown").await {
            debug!(error = %err, "error closing connection");
        }

        info!("rabbitmq connection closed");
    }
}

#[async_trait]
impl EventPublisher for RabbitMq {
    async fn publish(&self, routing_key: RoutingKey, message: &AmqpMessage) -> Result<()> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }

        let payload = serde_json::to_vec(message)?;
        let channel = self.publish_channel().await?;

        debug!(routing_key = %routing_key, owner_id = %message.owner_id, "publishing message");

        let publish = async {
            let confirm = channel
                .basic_publish(
                    &self.topology.exchange,
                    routing_key.as_str(),
                    BasicPublishOptions::default(),
                    &payload,
                    BasicProperties::default()
                        .with_content_type("application/json".into())
                        .with_delivery_mode(2), // persistent
                )
                .await
                .map_err(|err| BrokerError::Publish(format!("failed to publish: {err}")))?;

            let confirmation = confirm
                .await
                .map_err(|err| BrokerError::Publish(format!("publish confirmation failed: {err}")))?;

            if confirmation.is_nack() {
                return Err(BrokerError::Publish(format!(
                    "broker rejected message for {routing_key}"
                )));
            }
            Ok(())
        };

        tokio::time::timeout(self.publish_timeout, publish)
            .await
            .map_err(|_| BrokerError::Timeout(self.publish_timeout))??;

        self.metrics
            .events_published_total
            .with_label_values(&[routing_key.as_str()])
            .inc();

        Ok(())
    }
}

#[async_trait]
impl Delivery for lapin::message::Delivery {
    fn take_message(&mut self) -> InboundMessage {
        InboundMessage {
            routing_key: self.routing_key.as_str().to_string(),
            body: std::mem::take(&mut self.data),
            redelivered: self.redelivered,
        }
    }

    async fn ack(&self) -> Result<()> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|err| BrokerError::Acknowledge(format!("ack failed: {err}")))
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        self.acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
            .map_err(|err| BrokerError::Acknowledge(format!("nack failed: {err}")))
    }
}
