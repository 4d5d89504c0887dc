//! EventBus - ordered publish/subscribe for test notifications.
//!
//! Runners publish normalized notifications; the state updater and the
//! observer broadcaster consume them. Every subscriber owns its own delivery
//! queue, so a slow or failing subscriber never holds back the others, and
//! each one observes messages in publish order.

/// Core event bus implementation (one queue per subscriber).
pub mod bus;
/// Subscriber trait.
pub mod subscriber;

pub use bus::{EventBus, SubscriptionId};
pub use subscriber::Subscriber;
