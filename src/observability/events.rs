//! Gateway event bus.

use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 256;

/// Events fired by the request pipeline and background tasks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum GatewayEvent {
    AuthFailure {
        api_id: String,
        path: String,
        origin: String,
        key: String,
    },
    ReloadComplete {
        generation: u64,
        apis: usize,
    },
    EmergencyMode {
        active: bool,
    },
}

/// Fan-out of gateway events to any number of subscribers.
///
/// Publishing never blocks; slow subscribers lose the oldest events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }

    pub fn fire(&self, event: GatewayEvent) {
        tracing::debug!(?event, "Gateway event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.fire(GatewayEvent::EmergencyMode { active: true });
        assert_eq!(rx.recv().await.unwrap(), GatewayEvent::EmergencyMode { active: true });
    }

    #[test]
    fn test_fire_without_subscribers() {
        EventBus::new().fire(GatewayEvent::ReloadComplete { generation: 1, apis: 0 });
    }
}
