use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::domain::entities::Notification;
use crate::domain::ports::Notifier;

const NOTIFICATION_CAPACITY: usize = 64;

/// Fans notifications out to every subscribed view.
///
/// Publishing never blocks and never fails; with no subscribers the
/// notification is only logged.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        if notification.kind.is_error() {
            warn!(kind = ?notification.kind, message = %notification.message, "notification");
        } else {
            info!(kind = ?notification.kind, message = %notification.message, "notification");
        }
        let _ = self.tx.send(notification);
    }
}
