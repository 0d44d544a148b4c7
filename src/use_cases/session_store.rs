use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::domain::entities::Session;
use crate::domain::ports::LocalStore;

// Local key holding the guest marker.
pub const GUEST_MARKER_KEY: &str = "is_guest";

// Holds the current session and the locally persisted guest marker.
pub struct SessionStore {
    current: RwLock<Option<Session>>,
    local: Arc<dyn LocalStore>,
}

impl SessionStore {
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self {
            current: RwLock::new(None),
            local,
        }
    }

    pub async fn session(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn has_session(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn replace(&self, session: Option<Session>) {
        *self.current.write().await = session;
    }

    // An unreadable marker counts as "not a guest".
    pub fn is_guest(&self) -> bool {
        match self.local.get(GUEST_MARKER_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(err) => {
                warn!(error = %err, "failed to read guest marker");
                false
            }
        }
    }

    pub fn set_guest_marker(&self) {
        if let Err(err) = self.local.set(GUEST_MARKER_KEY, "true") {
            warn!(error = %err, "failed to persist guest marker");
        }
    }

    pub fn clear_guest_marker(&self) {
        if let Err(err) = self.local.remove(GUEST_MARKER_KEY) {
            warn!(error = %err, "failed to clear guest marker");
        }
    }
}
