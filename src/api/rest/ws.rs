use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::gateway::{DRIVER_CMD_REGISTER, DRIVER_CMD_TRIP_DECLINE, Role, WsMessage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DriverParams {
    #[serde(rename = "userID", default)]
    pub user_id: String,
    #[serde(rename = "packageSlug", default)]
    pub package_slug: String,
}

#[derive(Debug, Deserialize)]
struct TripDecline {
    #[serde(rename = "tripID")]
    trip_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RiderParams {
    #[serde(rename = "userID", default)]
    pub user_id: String,
}

pub async fn drivers_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<DriverParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    if params.user_id.trim().is_empty() || params.package_slug.trim().is_empty() {
        return Err(AppError::BadRequest(
            "userID and packageSlug are required".to_string(),
        ));
    }

    Ok(ws
        .on_upgrade(move |socket| handle_driver(socket, state, params))
        .into_response())
}

pub async fn riders_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<RiderParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    if params.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("userID is required".to_string()));
    }

    Ok(ws
        .on_upgrade(move |socket| handle_rider(socket, state, params.user_id))
        .into_response())
}

/// Releases a connection when its socket task ends.
///
/// Dropping a driver's guard also unregisters the driver, unless a newer
/// driver socket with the same id has taken over.
struct ConnectionGuard {
    state: Arc<AppState>,
    role: Role,
    user_id: String,
    sender: mpsc::UnboundedSender<WsMessage>,
}

impl ConnectionGuard {
    fn open(
        state: &Arc<AppState>,
        role: Role,
        user_id: &str,
    ) -> (Self, mpsc::UnboundedReceiver<WsMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        state.connections.add(role, user_id, tx.clone());
        let guard = Self {
            state: state.clone(),
            role,
            user_id: user_id.to_string(),
            sender: tx,
        };
        (guard, rx)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let current = self
            .state
            .connections
            .remove_if_same(self.role, &self.user_id, &self.sender);

        if self.role == Role::Driver && current {
            self.state.drivers.unregister(&self.user_id);
        }
        info!(user_id = %self.user_id, role = ?self.role, "websocket client disconnected");
    }
}

async fn handle_driver(socket: WebSocket, state: Arc<AppState>, params: DriverParams) {
    let (guard, rx) = ConnectionGuard::open(&state, Role::Driver, &params.user_id);

    let driver = match state.drivers.register(&params.user_id, &params.package_slug) {
        Ok(driver) => driver,
        Err(err) => {
            warn!(driver_id = %params.user_id, error = %err, "driver registration failed");
            return;
        }
    };

    match serde_json::to_value(&driver) {
        Ok(data) => {
            let _ = guard.sender.send(WsMessage::new(DRIVER_CMD_REGISTER, data));
        }
        Err(err) => warn!(driver_id = %driver.id, error = %err, "failed to serialize driver"),
    }

    run_socket(socket, rx, |message| {
        let state = state.clone();
        let driver_id = driver.id.clone();
        async move { on_driver_message(&state, &driver_id, message).await }
    })
    .await;
}

async fn handle_rider(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let (_guard, rx) = ConnectionGuard::open(&state, Role::Rider, &user_id);

    info!(user_id = %user_id, "rider connected");

    run_socket(socket, rx, |message| {
        let user_id = user_id.clone();
        async move {
            debug!(user_id = %user_id, kind = %message.kind, "rider message received");
        }
    })
    .await;
}

async fn on_driver_message(state: &AppState, driver_id: &str, message: WsMessage) {
    match message.kind.as_str() {
        DRIVER_CMD_TRIP_DECLINE => {
            let decline: TripDecline = match serde_json::from_value(message.data) {
                Ok(decline) => decline,
                Err(err) => {
                    warn!(driver_id, error = %err, "malformed trip decline");
                    return;
                }
            };
            if let Err(err) = state.trips.decline(driver_id, &decline.trip_id).await {
                warn!(
                    driver_id,
                    trip_id = %decline.trip_id,
                    error = %err,
                    "trip decline rejected"
                );
            }
        }
        other => debug!(driver_id, kind = other, "ignoring driver message"),
    }
}

async fn run_socket<F, Fut>(
    socket: WebSocket,
    mut outbound: mpsc::UnboundedReceiver<WsMessage>,
    mut on_message: F,
) where
    F: FnMut(WsMessage) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize ws frame");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsMessage>(&text) {
                    Ok(message) => on_message(message).await,
                    Err(err) => warn!(error = %err, "malformed ws frame"),
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    send_task.abort();
}
