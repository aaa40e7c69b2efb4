use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::driver::Driver;
use crate::models::trip::Trip;

pub const TRIP_EXCHANGE: &str = "trip";

#[derive(Debug, Error)]
pub enum EventError {
    #[error("unknown routing key: {0}")]
    UnknownRoutingKey(String),

    #[error("unexpected routing key {0} for this consumer")]
    UnexpectedRoutingKey(RoutingKey),

    #[error("{0} event carries no driver")]
    MissingDriver(RoutingKey),

    #[error("malformed event payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingKey {
    TripCreated,
    TripDriverNotInterested,
    TripNoDriversFound,
    DriverCmdTripRequest,
}

impl RoutingKey {
    pub const ALL: [RoutingKey; 4] = [
        RoutingKey::TripCreated,
        RoutingKey::TripDriverNotInterested,
        RoutingKey::TripNoDriversFound,
        RoutingKey::DriverCmdTripRequest,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            RoutingKey::TripCreated => "trip.created",
            RoutingKey::TripDriverNotInterested => "trip.driver-not-interested",
            RoutingKey::TripNoDriversFound => "trip.no-drivers-found",
            RoutingKey::DriverCmdTripRequest => "driver.cmd.trip-request",
        }
    }

    fn decoder(self) -> fn(Value) -> Result<TripEvent, serde_json::Error> {
        match self {
            RoutingKey::TripCreated => |data| Ok(TripEvent::Created(serde_json::from_value(data)?)),
            RoutingKey::TripDriverNotInterested => {
                |data| Ok(TripEvent::DriverNotInterested(serde_json::from_value(data)?))
            }
            RoutingKey::TripNoDriversFound => {
                |data| Ok(TripEvent::NoDriversFound(serde_json::from_value(data)?))
            }
            RoutingKey::DriverCmdTripRequest => {
                |data| Ok(TripEvent::DriverTripRequest(serde_json::from_value(data)?))
            }
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingKey {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoutingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| EventError::UnknownRoutingKey(s.to_string()))
    }
}

/// Wire envelope: `{ "ownerID": "...", "data": { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmqpMessage {
    #[serde(rename = "ownerID")]
    pub owner_id: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripEventData {
    pub trip: Trip,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
}

impl TripEventData {
    pub fn new(trip: Trip) -> Self {
        Self { trip, driver: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TripEvent {
    Created(TripEventData),
    DriverNotInterested(TripEventData),
    NoDriversFound(TripEventData),
    DriverTripRequest(TripEventData),
}

impl TripEvent {
    pub fn routing_key(&self) -> RoutingKey {
        match self {
            TripEvent::Created(_) => RoutingKey::TripCreated,
            TripEvent::DriverNotInterested(_) => RoutingKey::TripDriverNotInterested,
            TripEvent::NoDriversFound(_) => RoutingKey::TripNoDriversFound,
            TripEvent::DriverTripRequest(_) => RoutingKey::DriverCmdTripRequest,
        }
    }

    pub fn data(&self) -> &TripEventData {
        match self {
            TripEvent::Created(data)
            | TripEvent::DriverNotInterested(data)
            | TripEvent::NoDriversFound(data)
            | TripEvent::DriverTripRequest(data) => data,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    pub owner_id: String,
    pub event: TripEvent,
}

impl EventMessage {
    pub fn new(owner_id: impl Into<String>, event: TripEvent) -> Self {
        Self {
            owner_id: owner_id.into(),
            event,
        }
    }

    pub fn routing_key(&self) -> RoutingKey {
        self.event.routing_key()
    }

    pub fn decode(routing_key: &str, body: &[u8]) -> Result<Self, EventError> {
        let key: RoutingKey = routing_key.parse()?;
        let envelope: AmqpMessage = serde_json::from_slice(body)?;
        let event = (key.decoder())(envelope.data)?;

        Ok(Self {
            owner_id: envelope.owner_id,
            event,
        })
    }

    pub fn encode(&self) -> Result<AmqpMessage, EventError> {
        Ok(AmqpMessage {
            owner_id: self.owner_id.clone(),
            data: serde_json::to_value(self.event.data())?,
        })
    }
}
