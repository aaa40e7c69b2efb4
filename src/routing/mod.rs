use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::geo::haversine_km;
use crate::models::route::{Coordinate, Route};

pub mod osrm;

pub use osrm::OsrmRouteProvider;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("route request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("route provider returned {0}")]
    Provider(String),

    #[error("no route between the given points")]
    NoRoute,

    #[error("route request timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, pickup: &Coordinate, destination: &Coordinate) -> Result<Route, RoutingError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteProviderKind {
    Osrm,
    StraightLine,
}

impl FromStr for RouteProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "osrm" => Ok(RouteProviderKind::Osrm),
            "straight_line" => Ok(RouteProviderKind::StraightLine),
            other => Err(format!("unknown route provider {other}, expected osrm/straight_line")),
        }
    }
}

impl fmt::Display for RouteProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteProviderKind::Osrm => f.write_str("osrm"),
            RouteProviderKind::StraightLine => f.write_str("straight_line"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StraightLineRouteProvider {
    average_speed_kmh: f64,
}

impl Default for StraightLineRouteProvider {
    fn default() -> Self {
        Self {
            average_speed_kmh: 40.0,
        }
    }
}

impl StraightLineRouteProvider {
    pub fn new(average_speed_kmh: f64) -> Self {
        Self { average_speed_kmh }
    }
}

#[async_trait]
impl RouteProvider for StraightLineRouteProvider {
    async fn route(&self, pickup: &Coordinate, destination: &Coordinate) -> Result<Route, RoutingError> {
        let distance_km = haversine_km(pickup, destination);
        let duration_secs = if distance_km > 0.0 && self.average_speed_kmh > 0.0 {
            (distance_km / self.average_speed_kmh) * 3600.0
        } else {
            0.0
        };

        Ok(Route {
            distance: distance_km * 1_000.0,
            duration: duration_secs,
            geometry: vec![*pickup, *destination],
        })
    }
}
