use crate::error::Result;
use crate::model::NotificationMessage;

/// A consumer of bus notifications.
///
/// `handle` is awaited for one message at a time, in publish order. Errors
/// are logged by the bus and do not stop delivery of later messages.
#[async_trait::async_trait]
pub trait Subscriber: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Process one notification
    async fn handle(&self, message: &NotificationMessage) -> Result<()>;
}
