//! Event Emitter - threat alert broadcasting
//!
//! Fire-and-forget fan-out of threat snapshots to whoever subscribed.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::logic::threat::{AlertKind, ThreatAlert};

/// Event names
pub mod events {
    pub const NEW_THREAT: &str = "new_threat";
    pub const THREAT_UPDATED: &str = "threat_updated";
}

/// Receiver side of the alert broadcast
pub trait AlertSink: Send + Sync {
    fn publish(&self, alert: &ThreatAlert);
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub name: &'static str,
    pub alert: ThreatAlert,
}

impl AlertEvent {
    pub fn new(alert: ThreatAlert) -> Self {
        let name = match alert.kind {
            AlertKind::Created => events::NEW_THREAT,
            AlertKind::Updated => events::THREAT_UPDATED,
        };
        Self { name, alert }
    }
}

pub struct EventEmitter {
    sender: broadcast::Sender<AlertEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

impl AlertSink for EventEmitter {
    fn publish(&self, alert: &ThreatAlert) {
        let event = AlertEvent::new(alert.clone());
        let name = event.name;
        if self.sender.send(event).is_err() {
            tracing::debug!("No subscribers, event '{}' dropped", name);
        }
    }
}
