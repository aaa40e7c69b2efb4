use std::fmt::Display;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::broker::{Delivery, MessageHandler};
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acked,
    Discarded,
    Requeued,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Acked => "acked",
            Disposition::Discarded => "discarded",
            Disposition::Requeued => "requeued",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    StreamClosed,
    StreamFailed,
    Shutdown,
}

/// Runs `handler` on one delivery and settles it exactly once.
pub async fn settle<D, H>(queue: &str, mut delivery: D, handler: &H, metrics: &Metrics) -> Disposition
where
    D: Delivery,
    H: MessageHandler + ?Sized,
{
    let message = delivery.take_message();
    debug!(queue, routing_key = %message.routing_key, "received message");

    let (disposition, settled) = match handler.handle(&message).await {
        Ok(()) => (Disposition::Acked, delivery.ack().await),
        Err(err) => {
            // one retry per message; a redelivered failure is dropped
            let requeue = err.requeue() && !message.redelivered;
            warn!(
                queue,
                routing_key = %message.routing_key,
                requeue,
                redelivered = message.redelivered,
                error = %err,
                "failed to handle message"
            );
            let disposition = if requeue {
                Disposition::Requeued
            } else {
                Disposition::Discarded
            };
            (disposition, delivery.nack(requeue).await)
        }
    };

    if let Err(err) = settled {
        error!(queue, disposition = disposition.as_str(), error = %err, "failed to settle message");
    }

    metrics
        .deliveries_total
        .with_label_values(&[queue, disposition.as_str()])
        .inc();

    disposition
}

pub async fn drain<S, D, E, H>(
    queue: &str,
    mut deliveries: S,
    handler: &H,
    metrics: &Metrics,
    shutdown: &mut watch::Receiver<bool>,
) -> LoopExit
where
    S: Stream<Item = Result<D, E>> + Unpin,
    D: Delivery,
    E: Display,
    H: MessageHandler + ?Sized,
{
    if *shutdown.borrow() {
        return LoopExit::Shutdown;
    }

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return LoopExit::Shutdown;
                }
            }
            next = deliveries.next() => match next {
                Some(Ok(delivery)) => {
                    settle(queue, delivery, handler, metrics).await;
                }
                Some(Err(err)) => {
                    error!(queue, error = %err, "delivery stream failed");
                    return LoopExit::StreamFailed;
                }
                None => return LoopExit::StreamClosed,
            },
        }
    }
}
