use geohash::{Coord, GeohashError};

use crate::models::route::Coordinate;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub const GEOHASH_PRECISION: usize = 12;

pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Base32 geohash of `point`. Fails for coordinates outside the valid range.
pub fn geohash(point: &Coordinate, precision: usize) -> Result<String, GeohashError> {
    geohash::encode(
        Coord {
            x: point.longitude,
            y: point.latitude,
        },
        precision,
    )
}
