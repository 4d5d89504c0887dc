use super::subscriber::Subscriber;
use crate::model::NotificationMessage;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Handle returned by [`EventBus::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

enum Delivery {
    Message(Arc<NotificationMessage>),
    Barrier(oneshot::Sender<()>),
}

struct SubscriberQueue {
    id: SubscriptionId,
    name: String,
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Event bus with one unbounded, ordered delivery queue per subscriber.
///
/// Publishing never waits on a subscriber. The fan-out to all queues happens
/// under a single lock, so every subscriber sees the same total order even
/// when several runners publish concurrently.
pub struct EventBus {
    queues: Mutex<Vec<SubscriberQueue>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a subscriber for every message published from now on.
    ///
    /// Spawns the subscriber's delivery task, so this must be called from
    /// within a Tokio runtime.
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = subscriber.name().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(deliver(subscriber, rx));
        self.lock_queues().push(SubscriberQueue {
            id,
            name: name.clone(),
            tx,
        });

        debug!(subscriber = %name, "Subscriber registered");
        id
    }

    /// Stop delivering to a subscriber. Messages already queued are still
    /// handled. Returns false for an unknown id.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut queues = self.lock_queues();
        let before = queues.len();
        queues.retain(|queue| queue.id != id);
        before != queues.len()
    }

    /// Publish a message to all registered subscribers.
    ///
    /// Returns the number of subscriber queues that accepted the message.
    pub fn publish(&self, message: NotificationMessage) -> usize {
        let message = Arc::new(message);
        let mut queues = self.lock_queues();

        queues.retain(|queue| {
            let alive = !queue.tx.is_closed();
            if !alive {
                warn!(subscriber = %queue.name, "Subscriber delivery task ended, dropping it");
            }
            alive
        });

        queues
            .iter()
            .filter(|queue| queue.tx.send(Delivery::Message(Arc::clone(&message))).is_ok())
            .count()
    }

    /// Wait until every subscriber has handled all messages published before
    /// this call.
    pub async fn flush(&self) {
        let barriers: Vec<_> = {
            let queues = self.lock_queues();
            queues
                .iter()
                .filter_map(|queue| {
                    let (done_tx, done_rx) = oneshot::channel();
                    queue.tx.send(Delivery::Barrier(done_tx)).ok().map(|_| done_rx)
                })
                .collect()
        };

        for barrier in barriers {
            // A closed barrier means the delivery task is gone; nothing to wait for.
            let _ = barrier.await;
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock_queues().len()
    }

    fn lock_queues(&self) -> MutexGuard<'_, Vec<SubscriberQueue>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .lock_queues()
            .iter()
            .map(|queue| queue.name.clone())
            .collect();
        f.debug_struct("EventBus")
            .field("subscribers", &names)
            .finish()
    }
}

async fn deliver(subscriber: Arc<dyn Subscriber>, mut rx: mpsc::UnboundedReceiver<Delivery>) {
    while let Some(delivery) = rx.recv().await {
        let message = match delivery {
            Delivery::Message(message) => message,
            Delivery::Barrier(done) => {
                let _ = done.send(());
                continue;
            }
        };

        let outcome = AssertUnwindSafe(subscriber.handle(&message))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                subscriber = subscriber.name(),
                suite = %message.suite_name,
                test = %message.test_id,
                error = %e,
                "Subscriber failed to handle notification"
            ),
            Err(_) => error!(
                subscriber = subscriber.name(),
                suite = %message.suite_name,
                test = %message.test_id,
                "Subscriber panicked while handling notification"
            ),
        }
    }
    debug!(subscriber = subscriber.name(), "Subscriber delivery task finished");
}
