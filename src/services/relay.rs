//! Upstream event relay — domain CRUD events fanned out to every client.
//!
//! DESIGN
//! ======
//! The CRUD layer publishes `DomainEvent`s onto a process-wide broadcast bus;
//! a single relay task subscribes and forwards each one to every connected
//! client as a `realtime.event` message. Delivery is unscoped: entity change
//! notifications are cheap and clients filter by what they have on screen.
//!
//! The bus is bounded. A relay that falls behind drops the oldest events and
//! keeps going; clients reconcile via their normal data refresh.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::protocol::{ServerMessage, events};
use crate::state::AppState;

/// Depth of the domain-event bus. Publishing never blocks; slow subscribers
/// lose the oldest events past this.
const EVENT_BUS_CAPACITY: usize = 1024;

/// An entity mutation reported by the CRUD layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Entity kind, e.g. `"order"` or `"scheduleTemplate"`.
    pub entity: String,
    /// What happened: `"created"`, `"updated"`, `"deleted"`.
    pub action: String,
    /// Entity payload, opaque to the relay.
    pub data: Value,
}

/// Cloneable handle to the domain-event bus.
#[derive(Clone)]
pub struct DomainEventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl Default for DomainEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainEventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Succeeds whether or not anyone is listening.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

/// Spawn the relay task. Runs until the bus is dropped.
pub fn spawn_relay_task(state: AppState) -> JoinHandle<()> {
    let mut rx = state.events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let message = ServerMessage::new(events::REALTIME_EVENT, &event);
                    let collab = state.collab.read().await;
                    for tx in collab.clients.values() {
                        let _ = tx.try_send(message.clone());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event relay lagged, dropping oldest events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
