//! Room membership and fan-out.
//!
//! Tracks every connected client's outbound sender plus named room
//! membership. Sends to departed clients fail silently; the reader loop
//! is responsible for unregistering on disconnect.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use chat_types::event::ServerEvent;

pub type EventSender = UnboundedSender<ServerEvent>;

#[derive(Default)]
struct Registry {
    clients: HashMap<String, EventSender>,
    rooms: HashMap<String, HashSet<String>>,
}

#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client_id: &str, sender: EventSender) {
        let mut reg = self.inner.lock().expect("room registry poisoned");
        reg.clients.insert(client_id.to_string(), sender);
    }

    /// Drop a client from the registry and every room it joined.
    pub fn unregister(&self, client_id: &str) {
        let mut reg = self.inner.lock().expect("room registry poisoned");
        reg.clients.remove(client_id);
        for members in reg.rooms.values_mut() {
            members.remove(client_id);
        }
        reg.rooms.retain(|_, members| !members.is_empty());
    }

    /// Add the client to a room and tell the existing members.
    pub fn join(&self, room_id: &str, client_id: &str) {
        let mut reg = self.inner.lock().expect("room registry poisoned");
        let members = reg.rooms.entry(room_id.to_string()).or_default();
        let others: Vec<String> = members.iter().cloned().collect();
        members.insert(client_id.to_string());
        for other in others {
            if let Some(sender) = reg.clients.get(&other) {
                let _ = sender.send(ServerEvent::UserJoined {
                    client_id: client_id.to_string(),
                });
            }
        }
    }

    /// Remove the client from a room and tell the remaining members.
    pub fn leave(&self, room_id: &str, client_id: &str) {
        let mut reg = self.inner.lock().expect("room registry poisoned");
        let Some(members) = reg.rooms.get_mut(room_id) else {
            return;
        };
        if !members.remove(client_id) {
            return;
        }
        if members.is_empty() {
            reg.rooms.remove(room_id);
        }
        let remaining: Vec<String> = reg
            .rooms
            .get(room_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        for other in remaining {
            if let Some(sender) = reg.clients.get(&other) {
                let _ = sender.send(ServerEvent::UserLeft {
                    client_id: client_id.to_string(),
                });
            }
        }
    }

    /// Deliver a payload to every member of a room, sender included.
    pub fn send_to_room(&self, room_id: &str, from: &str, message: Value) {
        let reg = self.inner.lock().expect("room registry poisoned");
        let Some(members) = reg.rooms.get(room_id) else {
            return;
        };
        for member in members {
            if let Some(sender) = reg.clients.get(member) {
                let _ = sender.send(ServerEvent::RoomMessage {
                    from: from.to_string(),
                    message: message.clone(),
                });
            }
        }
    }

    /// Deliver an event to every connected client.
    pub fn broadcast(&self, event: ServerEvent) {
        let reg = self.inner.lock().expect("room registry poisoned");
        for sender in reg.clients.values() {
            let _ = sender.send(event.clone());
        }
    }
}
