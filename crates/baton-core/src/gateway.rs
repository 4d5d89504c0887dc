//! Notification gateway subscribers.
//!
//! Two bus subscribers bridge notifications to the rest of the system:
//! [`StateUpdater`] keeps the [`SuiteRegistry`] current and [`Broadcaster`]
//! pushes every message to the connected observers as a JSON-RPC
//! notification on the [`TEST_TOPIC`] topic.

use crate::error::{Error, Result};
use crate::event_bus::{EventBus, Subscriber};
use crate::model::NotificationMessage;
use crate::registry::SuiteRegistry;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// JSON-RPC protocol version marker.
pub const JSONRPC_VERSION: &str = "2.0";

/// Topic (and notification method) test notifications are published on.
pub const TEST_TOPIC: &str = "test";

/// Build the JSON-RPC notification envelope for a message.
pub fn notification_envelope(message: &NotificationMessage) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": null,
        "method": TEST_TOPIC,
        "params": message,
    })
}

/// Live set of observers, each reachable through its connection's outbound
/// text channel.
///
/// Broadcasts iterate a snapshot, so observers may connect or disconnect
/// while a broadcast is in flight.
#[derive(Debug, Default)]
pub struct ObserverSet {
    observers: DashMap<Uuid, mpsc::UnboundedSender<String>>,
}

impl ObserverSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an observer.
    pub fn insert(&self, id: Uuid, tx: mpsc::UnboundedSender<String>) {
        self.observers.insert(id, tx);
        debug!(observer = %id, total = self.observers.len(), "Observer subscribed");
    }

    /// Remove an observer. Returns false if it was not present.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.observers.remove(&id).is_some();
        if removed {
            debug!(observer = %id, total = self.observers.len(), "Observer removed");
        }
        removed
    }

    /// Whether an observer is in the set.
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.observers.contains_key(&id)
    }

    /// Number of live observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Send a frame to one observer.
    pub fn send(&self, id: Uuid, frame: String) -> Result<()> {
        let tx = self
            .observers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(Error::ObserverDelivery(id))?;
        tx.send(frame).map_err(|_| Error::ObserverDelivery(id))
    }

    /// Send a frame to every observer, dropping the ones whose connection is
    /// gone. Returns the number of observers reached.
    pub fn broadcast(&self, frame: &str) -> usize {
        let snapshot: Vec<Uuid> = self.observers.iter().map(|entry| *entry.key()).collect();
        let mut delivered = 0;
        for id in snapshot {
            match self.send(id, frame.to_string()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(observer = %id, error = %e, "Dropping observer");
                    self.remove(id);
                }
            }
        }
        delivered
    }
}

/// Applies every notification to the suite registry.
#[derive(Debug)]
pub struct StateUpdater {
    registry: Arc<SuiteRegistry>,
}

impl StateUpdater {
    /// Create an updater for a registry.
    pub fn new(registry: Arc<SuiteRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait::async_trait]
impl Subscriber for StateUpdater {
    fn name(&self) -> &str {
        "state_updater"
    }

    async fn handle(&self, message: &NotificationMessage) -> Result<()> {
        self.registry
            .update_test(&message.suite_name, message)
            .await
            .map(|_| ())
    }
}

/// Forwards every notification to the connected observers.
#[derive(Debug)]
pub struct Broadcaster {
    observers: Arc<ObserverSet>,
}

impl Broadcaster {
    /// Create a broadcaster over an observer set.
    pub fn new(observers: Arc<ObserverSet>) -> Self {
        Self { observers }
    }
}

#[async_trait::async_trait]
impl Subscriber for Broadcaster {
    fn name(&self) -> &str {
        "broadcaster"
    }

    async fn handle(&self, message: &NotificationMessage) -> Result<()> {
        if self.observers.is_empty() {
            return Ok(());
        }
        let frame = serde_json::to_string(&notification_envelope(message))?;
        let delivered = self.observers.broadcast(&frame);
        debug!(
            suite = %message.suite_name,
            test = %message.test_id,
            observers = delivered,
            "Forwarded notification"
        );
        Ok(())
    }
}

/// Register the gateway subscribers on a bus: the broadcaster first, then
/// the state updater.
pub fn install(bus: &EventBus, registry: Arc<SuiteRegistry>, observers: Arc<ObserverSet>) {
    bus.register(Arc::new(Broadcaster::new(observers)));
    bus.register(Arc::new(StateUpdater::new(registry)));
}
