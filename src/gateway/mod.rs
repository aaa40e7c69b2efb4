pub mod connections;
pub mod forwarder;

pub use connections::{ConnectionError, ConnectionManager, Role, WsMessage};
pub use forwarder::NotificationForwarder;

pub const DRIVER_CMD_REGISTER: &str = "driver.cmd.register";
pub const DRIVER_CMD_TRIP_DECLINE: &str = "driver.cmd.trip-decline";
