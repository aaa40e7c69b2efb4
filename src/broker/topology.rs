use crate::events::{RoutingKey, TRIP_EXCHANGE};

pub const FIND_AVAILABLE_DRIVERS_QUEUE: &str = "find_available_drivers";
pub const DRIVER_CMD_TRIP_REQUEST_QUEUE: &str = "driver_cmd_trip_request";
pub const NOTIFY_NO_DRIVERS_FOUND_QUEUE: &str = "notify_no_drivers_found";
pub const TRIP_OUTCOMES_QUEUE: &str = "trip_outcomes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub queue: String,
    pub routing_keys: Vec<RoutingKey>,
}

impl QueueBinding {
    pub fn new(queue: impl Into<String>, routing_keys: &[RoutingKey]) -> Self {
        Self {
            queue: queue.into(),
            routing_keys: routing_keys.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    pub queues: Vec<QueueBinding>,
}

impl Topology {
    pub fn ride_dispatch() -> Self {
        Self {
            exchange: TRIP_EXCHANGE.to_string(),
            queues: vec![
                QueueBinding::new(
                    FIND_AVAILABLE_DRIVERS_QUEUE,
                    &[RoutingKey::TripCreated, RoutingKey::TripDriverNotInterested],
                ),
                QueueBinding::new(
                    DRIVER_CMD_TRIP_REQUEST_QUEUE,
                    &[RoutingKey::DriverCmdTripRequest],
                ),
                QueueBinding::new(
                    NOTIFY_NO_DRIVERS_FOUND_QUEUE,
                    &[RoutingKey::TripNoDriversFound],
                ),
                QueueBinding::new(
                    TRIP_OUTCOMES_QUEUE,
                    &[
                        RoutingKey::DriverCmdTripRequest,
                        RoutingKey::TripNoDriversFound,
                    ],
                ),
            ],
        }
    }

    pub fn queue(&self, name: &str) -> Option<&QueueBinding> {
        self.queues.iter().find(|binding| binding.queue == name)
    }

    pub fn route(&self, routing_key: RoutingKey) -> Vec<&str> {
        self.queues
            .iter()
            .filter(|binding| binding.routing_keys.contains(&routing_key))
            .map(|binding| binding.queue.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_queue_receives_created_and_not_interested() {
        let topology = Topology::ride_dispatch();
        let binding = topology.queue(FIND_AVAILABLE_DRIVERS_QUEUE).unwrap();

        assert_eq!(
            binding.routing_keys,
            vec![RoutingKey::TripCreated, RoutingKey::TripDriverNotInterested]
        );
    }

    #[test]
    fn every_routing_key_reaches_a_queue() {
        let topology = Topology::ride_dispatch();
        for key in RoutingKey::ALL {
            assert!(!topology.route(key).is_empty(), "{key} is not routed");
        }
    }

    #[test]
    fn outcomes_fan_out_to_notification_and_outcome_queues() {
        let topology = Topology::ride_dispatch();

        assert_eq!(
            topology.route(RoutingKey::DriverCmdTripRequest),
            vec![DRIVER_CMD_TRIP_REQUEST_QUEUE, TRIP_OUTCOMES_QUEUE]
        );
        assert_eq!(
            topology.route(RoutingKey::TripNoDriversFound),
            vec![NOTIFY_NO_DRIVERS_FOUND_QUEUE, TRIP_OUTCOMES_QUEUE]
        );
    }
}
