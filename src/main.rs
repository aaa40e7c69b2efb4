use std::sync::Arc;

use tokio::sync::watch;
use tonic::transport::Server as TonicServer;
use tracing_subscriber::EnvFilter;

use ride_dispatch::api;
use ride_dispatch::api::grpc::pb::driver_service_server::DriverServiceServer;
use ride_dispatch::api::grpc::pb::trip_service_server::TripServiceServer;
use ride_dispatch::api::grpc::{GrpcDriverService, GrpcTripService};
use ride_dispatch::broker::topology::{
    DRIVER_CMD_TRIP_REQUEST_QUEUE, FIND_AVAILABLE_DRIVERS_QUEUE, NOTIFY_NO_DRIVERS_FOUND_QUEUE,
    TRIP_OUTCOMES_QUEUE,
};
use ride_dispatch::broker::{MessageHandler, RabbitMq, Topology};
use ride_dispatch::config::{Config, LogFormat};
use ride_dispatch::error::AppError;
use ride_dispatch::observability::metrics::Metrics;
use ride_dispatch::routing::osrm::OsrmRouteProvider;
use ride_dispatch::routing::{RouteProvider, RouteProviderKind, StraightLineRouteProvider};
use ride_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let metrics = Metrics::new();

    let broker = RabbitMq::connect(&config.rabbitmq_uri, Topology::ride_dispatch(), metrics.clone())
        .await
        .map_err(|err| AppError::Internal(format!("rabbitmq unavailable: {err}")))?
        .with_publish_timeout(config.publish_timeout);
    let broker = Arc::new(broker);
    broker
        .declare_topology()
        .await
        .map_err(|err| AppError::Internal(format!("failed to declare topology: {err}")))?;

    let routes: Arc<dyn RouteProvider> = match config.routing_provider {
        RouteProviderKind::Osrm => Arc::new(
            OsrmRouteProvider::new(&config.osrm_base_url, config.routing_timeout)
                .map_err(|err| AppError::Internal(format!("invalid route provider: {err}")))?,
        ),
        RouteProviderKind::StraightLine => Arc::new(StraightLineRouteProvider::default()),
    };
    tracing::info!(provider = %config.routing_provider, "route provider configured");

    let shared_state = Arc::new(AppState::new(
        broker.clone(),
        routes,
        config.routing_timeout,
        metrics,
    )
    .with_pricing(config.pricing));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher: Arc<dyn MessageHandler> = Arc::new(shared_state.dispatcher());
    let forwarder: Arc<dyn MessageHandler> = Arc::new(shared_state.forwarder());
    let recorder: Arc<dyn MessageHandler> = Arc::new(shared_state.outcome_recorder());

    let mut subscriptions = Vec::new();
    for _ in 0..config.dispatch_workers {
        subscriptions.push((FIND_AVAILABLE_DRIVERS_QUEUE, dispatcher.clone()));
    }
    subscriptions.push((DRIVER_CMD_TRIP_REQUEST_QUEUE, forwarder.clone()));
    subscriptions.push((NOTIFY_NO_DRIVERS_FOUND_QUEUE, forwarder));
    subscriptions.push((TRIP_OUTCOMES_QUEUE, recorder));

    let mut consumers = Vec::with_capacity(subscriptions.len());
    for (queue, handler) in subscriptions {
        let consumer = broker
            .consume(queue, handler, shutdown_rx.clone())
            .await
            .map_err(|err| AppError::Internal(format!("failed to consume {queue}: {err}")))?;
        consumers.push(consumer);
    }

    let grpc_addr = format!("0.0.0.0:{}", config.grpc_port)
        .parse()
        .map_err(|err| AppError::Internal(format!("invalid grpc address: {err}")))?;
    let grpc_drivers = GrpcDriverService::new(shared_state.clone());
    let grpc_trips = GrpcTripService::new(shared_state.clone());
    let mut grpc_shutdown = shutdown_rx.clone();

    let grpc_server = tokio::spawn(async move {
        tracing::info!(grpc_port = %grpc_addr, "grpc server started");
        if let Err(err) = TonicServer::builder()
            .add_service(DriverServiceServer::new(grpc_drivers))
            .add_service(TripServiceServer::new(grpc_trips))
            .serve_with_shutdown(grpc_addr, async move {
                let _ = grpc_shutdown.wait_for(|stop| *stop).await;
            })
            .await
        {
            tracing::error!(error = %err, "grpc server failed");
        }
    });

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")));

    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    for consumer in consumers {
        if let Err(err) = consumer.await {
            tracing::warn!(error = %err, "consumer task ended abnormally");
        }
    }
    if let Err(err) = grpc_server.await {
        tracing::warn!(error = %err, "grpc server task ended abnormally");
    }
    broker.close().await;

    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
