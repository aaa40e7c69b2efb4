use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::models::driver::Driver;
use crate::models::route::{Coordinate, Route};
use crate::models::trip::RideFare;
use crate::state::AppState;

pub mod pb {
    tonic::include_proto!("ride");
}

use pb::driver_service_server::DriverService as DriverRpc;
use pb::trip_service_server::TripService as TripRpc;
use pb::{
    CreateTripRequest, CreateTripResponse, PreviewTripRequest, PreviewTripResponse,
    RegisterDriverRequest, RegisterDriverResponse,
};

pub struct GrpcDriverService {
    state: Arc<AppState>,
}

impl GrpcDriverService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

pub struct GrpcTripService {
    state: Arc<AppState>,
}

impl GrpcTripService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

fn coordinate_to_proto(c: &Coordinate) -> pb::Coordinate {
    pb::Coordinate {
        latitude: c.latitude,
        longitude: c.longitude,
    }
}

fn coordinate_from_proto(c: Option<pb::Coordinate>, field: &str) -> Result<Coordinate, Status> {
    c.map(|c| Coordinate::new(c.latitude, c.longitude))
        .ok_or_else(|| Status::invalid_argument(format!("{field} is required")))
}

fn driver_to_proto(d: &Driver) -> pb::Driver {
    pb::Driver {
        id: d.id.clone(),
        name: d.name.clone(),
        profile_picture: d.profile_picture.clone(),
        car_plate: d.car_plate.clone(),
        geohash: d.geohash.clone(),
        package_slug: d.package_slug.clone(),
        location: Some(coordinate_to_proto(&d.location)),
    }
}

fn route_to_proto(r: &Route) -> pb::Route {
    pb::Route {
        distance: r.distance,
        duration: r.duration,
        geometry: r.geometry.iter().map(coordinate_to_proto).collect(),
    }
}

fn fare_to_proto(f: &RideFare) -> pb::RideFare {
    pb::RideFare {
        id: f.id.clone(),
        user_id: f.user_id.clone(),
        package_slug: f.package_slug.clone(),
        total_price_in_cents: f.total_price_in_cents,
    }
}

#[tonic::async_trait]
impl DriverRpc for GrpcDriverService {
    async fn register_driver(
        &self,
        request: Request<RegisterDriverRequest>,
    ) -> Result<Response<RegisterDriverResponse>, Status> {
        let req = request.into_inner();
        let driver = self
            .state
            .drivers
            .register(&req.driver_id, &req.package_slug)
            .map_err(Status::from)?;

        Ok(Response::new(RegisterDriverResponse {
            driver: Some(driver_to_proto(&driver)),
        }))
    }

    async fn unregister_driver(
        &self,
        request: Request<RegisterDriverRequest>,
    ) -> Result<Response<RegisterDriverResponse>, Status> {
        let req = request.into_inner();
        let driver = match self.state.drivers.unregister(&req.driver_id) {
            Some(driver) => driver_to_proto(&driver),
            None => pb::Driver {
                id: req.driver_id,
                package_slug: req.package_slug,
                ..Default::default()
            },
        };

        Ok(Response::new(RegisterDriverResponse {
            driver: Some(driver),
        }))
    }
}

#[tonic::async_trait]
impl TripRpc for GrpcTripService {
    async fn preview_trip(
        &self,
        request: Request<PreviewTripRequest>,
    ) -> Result<Response<PreviewTripResponse>, Status> {
        let req = request.into_inner();
        let pickup = coordinate_from_proto(req.start_location, "start_location")?;
        let destination = coordinate_from_proto(req.end_location, "end_location")?;

        let preview = self
            .state
            .trips
            .preview(&req.user_id, pickup, destination)
            .await
            .map_err(Status::from)?;

        Ok(Response::new(PreviewTripResponse {
            route: Some(route_to_proto(&preview.route)),
            ride_fares: preview.ride_fares.iter().map(fare_to_proto).collect(),
        }))
    }

    async fn create_trip(
        &self,
        request: Request<CreateTripRequest>,
    ) -> Result<Response<CreateTripResponse>, Status> {
        let req = request.into_inner();
        let trip = self
            .state
            .trips
            .create(&req.ride_fare_id, &req.user_id)
            .await
            .map_err(Status::from)?;

        Ok(Response::new(CreateTripResponse { trip_id: trip.id }))
    }
}
