use serde::{Deserialize, Serialize};

use crate::models::route::Coordinate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub profile_picture: String,
    pub car_plate: String,
    pub geohash: String,
    pub package_slug: String,
    pub location: Coordinate,
}
