use serde::{Deserialize, Serialize};

use crate::models::driver::Driver;
use crate::models::route::Route;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Pending,
    DriverAssigned,
    NoDriversFound,
}

impl TripStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TripStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RideFare {
    pub id: String,
    pub user_id: String,
    pub package_slug: String,
    pub total_price_in_cents: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripDriver {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default)]
    pub car_plate: String,
}

impl From<&Driver> for TripDriver {
    fn from(driver: &Driver) -> Self {
        Self {
            id: driver.id.clone(),
            name: driver.name.clone(),
            profile_picture: driver.profile_picture.clone(),
            car_plate: driver.car_plate.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: String,
    pub user_id: String,
    pub status: TripStatus,
    pub selected_fare: RideFare,
    #[serde(default)]
    pub driver: Option<TripDriver>,
}

impl Trip {
    pub fn pending(id: String, fare: RideFare) -> Self {
        Self {
            id,
            user_id: fare.user_id.clone(),
            status: TripStatus::Pending,
            selected_fare: fare,
            driver: None,
        }
    }

    pub fn package_slug(&self) -> &str {
        &self.selected_fare.package_slug
    }

    /// Moves a pending trip into the state described by `outcome`.
    /// Returns `false` and leaves the trip untouched once it is terminal.
    pub fn apply(&mut self, outcome: TripOutcome) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        match outcome {
            TripOutcome::DriverAssigned(driver) => {
                self.status = TripStatus::DriverAssigned;
                self.driver = Some(driver);
            }
            TripOutcome::NoDriversFound => {
                self.status = TripStatus::NoDriversFound;
            }
        }
        true
    }

    pub fn release(&mut self, driver_id: &str) -> bool {
        let assigned_here = self.status == TripStatus::DriverAssigned
            && self.driver.as_ref().is_some_and(|driver| driver.id == driver_id);
        if !assigned_here {
            return false;
        }

        self.status = TripStatus::Pending;
        self.driver = None;
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TripOutcome {
    DriverAssigned(TripDriver),
    NoDriversFound,
}

#[cfg(test)]
mod tests {
    use super::{RideFare, Trip, TripDriver, TripOutcome, TripStatus};

    fn trip() -> Trip {
        Trip::pending(
            "trip-1".to_string(),
            RideFare {
                id: "fare-1".to_string(),
                user_id: "rider-1".to_string(),
                package_slug: "suv".to_string(),
                total_price_in_cents: 1234.0,
                route: None,
            },
        )
    }

    #[test]
    fn pending_trip_takes_owner_from_fare() {
        let trip = trip();
        assert_eq!(trip.user_id, "rider-1");
        assert_eq!(trip.status, TripStatus::Pending);
        assert!(trip.driver.is_none());
    }

    #[test]
    fn outcome_is_applied_only_once() {
        let mut trip = trip();
        let driver = TripDriver {
            id: "driver-1".to_string(),
            name: String::new(),
            profile_picture: String::new(),
            car_plate: String::new(),
        };

        assert!(trip.apply(TripOutcome::DriverAssigned(driver.clone())));
        assert_eq!(trip.status, TripStatus::DriverAssigned);
        assert_eq!(trip.driver, Some(driver));

        assert!(!trip.apply(TripOutcome::NoDriversFound));
        assert_eq!(trip.status, TripStatus::DriverAssigned);
    }

    #[test]
    fn only_the_assigned_driver_can_release_a_trip() {
        let mut trip = trip();
        assert!(!trip.release("driver-1"));

        trip.apply(TripOutcome::DriverAssigned(TripDriver {
            id: "driver-1".to_string(),
            name: String::new(),
            profile_picture: String::new(),
            car_plate: String::new(),
        }));
        assert!(!trip.release("driver-2"));
        assert_eq!(trip.status, TripStatus::DriverAssigned);

        assert!(trip.release("driver-1"));
        assert_eq!(trip.status, TripStatus::Pending);
        assert!(trip.driver.is_none());
        assert!(trip.apply(TripOutcome::NoDriversFound));
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&TripStatus::NoDriversFound).unwrap();
        assert_eq!(json, "\"no_drivers_found\"");
    }
}
