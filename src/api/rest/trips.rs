use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::route::Coordinate;
use crate::models::trip::Trip;
use crate::service::TripPreview;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trip/preview", post(preview_trip))
        .route("/trip/start", post(start_trip))
        .route("/trips/:id", get(get_trip))
}

#[derive(Deserialize)]
pub struct PreviewTripRequest {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub pickup: Coordinate,
    pub destination: Coordinate,
}

#[derive(Deserialize)]
pub struct StartTripRequest {
    #[serde(rename = "rideFareID")]
    pub ride_fare_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Serialize)]
pub struct StartTripResponse {
    #[serde(rename = "tripID")]
    pub trip_id: String,
    pub trip: Trip,
}

async fn preview_trip(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PreviewTripRequest>,
) -> Result<Json<TripPreview>, AppError> {
    let preview = state
        .trips
        .preview(&payload.user_id, payload.pickup, payload.destination)
        .await?;

    Ok(Json(preview))
}

async fn start_trip(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartTripRequest>,
) -> Result<Json<StartTripResponse>, AppError> {
    let trip = state
        .trips
        .create(&payload.ride_fare_id, &payload.user_id)
        .await?;

    Ok(Json(StartTripResponse {
        trip_id: trip.id.clone(),
        trip,
    }))
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.get(&id).await?))
}
