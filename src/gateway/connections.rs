use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl WsMessage {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Driver,
    Rider,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("{0:?} {1} has no live connection")]
    NotConnected(Role, String),

    #[error("connection of {0:?} {1} is closed")]
    Closed(Role, String),
}

/// One outbound channel per connected user and role; a newer connection
/// replaces the older one of the same role.
#[derive(Default)]
pub struct ConnectionManager {
    connections: DashMap<(Role, String), mpsc::UnboundedSender<WsMessage>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, role: Role, user_id: &str, sender: mpsc::UnboundedSender<WsMessage>) {
        self.connections.insert((role, user_id.to_string()), sender);
    }

    /// Removes the connection only if it is still the one registered for `user_id`.
    pub fn remove_if_same(
        &self,
        role: Role,
        user_id: &str,
        sender: &mpsc::UnboundedSender<WsMessage>,
    ) -> bool {
        self.connections
            .remove_if(&(role, user_id.to_string()), |_, current| {
                current.same_channel(sender)
            })
            .is_some()
    }

    pub fn send(&self, role: Role, user_id: &str, message: WsMessage) -> Result<(), ConnectionError> {
        let sender = self
            .connections
            .get(&(role, user_id.to_string()))
            .ok_or_else(|| ConnectionError::NotConnected(role, user_id.to_string()))?;

        sender
            .send(message)
            .map_err(|_| ConnectionError::Closed(role, user_id.to_string()))
    }

    pub fn is_connected(&self, role: Role, user_id: &str) -> bool {
        self.connections.contains_key(&(role, user_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
