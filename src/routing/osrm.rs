use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::models::route::{Coordinate, Route};
use crate::routing::{RouteProvider, RoutingError};

#[derive(Debug, Clone)]
pub struct OsrmRouteProvider {
    client: Client,
    endpoint: String,
}

impl OsrmRouteProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RoutingError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn route_url(&self, pickup: &Coordinate, destination: &Coordinate) -> Result<Url, RoutingError> {
        let base = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.endpoint,
            pickup.longitude,
            pickup.latitude,
            destination.longitude,
            destination.latitude
        );
        let mut url = Url::parse(&base)
            .map_err(|err| RoutingError::Provider(format!("invalid OSRM url: {err}")))?;
        url.query_pairs_mut()
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson");
        Ok(url)
    }
}

#[async_trait]
impl RouteProvider for OsrmRouteProvider {
    async fn route(&self, pickup: &Coordinate, destination: &Coordinate) -> Result<Route, RoutingError> {
        let url = self.route_url(pickup, destination)?;
        debug!(url = %url, "requesting route");

        let response = self.client.get(url).send().await?.error_for_status()?;
        let parsed: OsrmRouteResponse = response.json().await?;
        parsed.into_route()
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

impl OsrmRouteResponse {
    fn into_route(self) -> Result<Route, RoutingError> {
        if self.code != "Ok" {
            return Err(RoutingError::Provider(self.code));
        }

        let route = self.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;
        Ok(Route {
            distance: route.distance,
            duration: route.duration,
            // GeoJSON positions are [longitude, latitude]
            geometry: route
                .geometry
                .coordinates
                .into_iter()
                .map(|[longitude, latitude]| Coordinate::new(latitude, longitude))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{OsrmRouteProvider, OsrmRouteResponse};
    use crate::models::route::Coordinate;
    use crate::routing::RoutingError;

    #[test]
    fn parses_first_route_and_swaps_geojson_order() {
        let body = r#"{
            "code": "Ok",
            "routes": [
                {
                    "distance": 1520.4,
                    "duration": 301.2,
                    "geometry": { "coordinates": [[-122.4194, 37.7749], [-122.4089, 37.7837]] }
                },
                {
                    "distance": 9999.0,
                    "duration": 9999.0,
                    "geometry": { "coordinates": [] }
                }
            ]
        }"#;
        let parsed: OsrmRouteResponse = serde_json::from_str(body).unwrap();

        let route = parsed.into_route().unwrap();

        assert_eq!(route.distance, 1520.4);
        assert_eq!(route.duration, 301.2);
        assert_eq!(route.geometry[0], Coordinate::new(37.7749, -122.4194));
    }

    #[test]
    fn empty_routes_is_no_route() {
        let parsed: OsrmRouteResponse =
            serde_json::from_str(r#"{ "code": "Ok", "routes": [] }"#).unwrap();
        assert!(matches!(parsed.into_route(), Err(RoutingError::NoRoute)));
    }

    #[test]
    fn error_code_is_reported() {
        let parsed: OsrmRouteResponse =
            serde_json::from_str(r#"{ "code": "NoSegment" }"#).unwrap();
        assert!(matches!(parsed.into_route(), Err(RoutingError::Provider(code)) if code == "NoSegment"));
    }

    #[test]
    fn route_url_puts_longitude_first() {
        let provider = OsrmRouteProvider::new("http://osrm.local/", Duration::from_secs(1)).unwrap();
        let url = provider
            .route_url(
                &Coordinate::new(37.7749, -122.4194),
                &Coordinate::new(37.7837, -122.4089),
            )
            .unwrap();

        assert_eq!(
            url.as_str(),
            "http://osrm.local/route/v1/driving/-122.4194,37.7749;-122.4089,37.7837?overview=full&geometries=geojson"
        );
    }
}
