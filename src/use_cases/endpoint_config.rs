use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::domain::entities::{Notification, NotificationKind};
use crate::domain::errors::ConfigError;
use crate::domain::ports::{LocalStore, Notifier};

// Local key holding the configured answering endpoint.
pub const ENDPOINT_KEY: &str = "answer_endpoint_url";

// Validated, locally persisted address of the answering endpoint.
// Saves and clears report their outcome to the user.
pub struct EndpointConfigStore {
    local: Arc<dyn LocalStore>,
    notifier: Arc<dyn Notifier>,
}

impl EndpointConfigStore {
    pub fn new(local: Arc<dyn LocalStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { local, notifier }
    }

    // Raw stored address; an unreadable store counts as "not configured".
    pub fn get(&self) -> Option<String> {
        match self.local.get(ENDPOINT_KEY) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(err) => {
                warn!(error = %err, "failed to read endpoint address");
                None
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.get().is_some()
    }

    // Persists the address only after it validates.
    pub fn set(&self, address: &str) -> Result<Url, ConfigError> {
        let result = validate_address(address).and_then(|url| {
            self.local
                .set(ENDPOINT_KEY, url.as_str())
                .map_err(ConfigError::Storage)?;
            Ok(url)
        });
        match &result {
            Ok(url) => {
                info!(endpoint = %url, "answering endpoint configured");
                self.notifier.notify(Notification::new(
                    NotificationKind::Info,
                    "Answering endpoint saved",
                ));
            }
            Err(err) => self.report(err),
        }
        result
    }

    pub fn clear(&self) -> Result<(), ConfigError> {
        let result = self.local.remove(ENDPOINT_KEY).map_err(ConfigError::Storage);
        match &result {
            Ok(()) => {
                info!("answering endpoint cleared");
                self.notifier.notify(Notification::new(
                    NotificationKind::Info,
                    "Answering endpoint cleared",
                ));
            }
            Err(err) => self.report(err),
        }
        result
    }

    fn report(&self, err: &ConfigError) {
        warn!(error = %err, "endpoint configuration rejected");
        self.notifier.notify(err.notification());
    }
}

pub fn validate_address(address: &str) -> Result<Url, ConfigError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidAddress("address is empty".to_string()));
    }

    let url = Url::parse(trimmed).map_err(|err| ConfigError::InvalidAddress(err.to_string()))?;

    // The endpoint is POSTed to, so only web schemes with a host make sense.
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidAddress(format!(
            "unsupported scheme `{}`",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidAddress("address has no host".to_string()));
    }

    Ok(url)
}
