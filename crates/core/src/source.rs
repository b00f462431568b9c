use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::types::{CanonicalType, Notification};

/// Delivers notifications for one type, in order per object. Every stream
/// starts by replaying the existing objects as `Add`.
#[async_trait::async_trait]
pub trait NotificationSource: Send + Sync {
    async fn subscribe(&self, target: &CanonicalType) -> Result<mpsc::Receiver<Notification>, WatchError>;
}
