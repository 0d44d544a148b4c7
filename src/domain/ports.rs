use async_trait::async_trait;
use tokio::sync::broadcast;
use url::Url;

use crate::domain::entities::{
    NewProfile, Notification, Profile, ProfilePatch, Session, SessionChange, SignUpOutcome,
};
use crate::domain::errors::{ChatError, IdentityError};

// Port for the external authentication backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    // Resolve the persisted session, refreshing it if the provider can.
    async fn current_session(&self) -> Result<Option<Session>, IdentityError>;
    // Subscribe to provider-pushed transitions. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, IdentityError>;
    async fn sign_out(&self) -> Result<(), IdentityError>;
    // Returns the address the user must visit to authorize.
    async fn sign_in_with_oauth(&self, provider: &str) -> Result<String, IdentityError>;
    async fn complete_oauth_callback(&self, callback_url: &str) -> Result<Session, IdentityError>;
}

// Port for the `profiles` table keyed by identity id.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Option<Profile>, IdentityError>;
    async fn insert(&self, profile: NewProfile) -> Result<(), IdentityError>;
    async fn update(&self, id: &str, patch: ProfilePatch) -> Result<(), IdentityError>;
}

// Port for the single-shot question answering service.
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn answer(&self, endpoint: &Url, question: &str) -> Result<String, ChatError>;
}

// Port for client-local string storage that survives reloads.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, String>;
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
    fn remove(&self, key: &str) -> Result<(), String>;
}

// Port for surfacing transient notifications to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> u64;

    fn now_epoch_millis(&self) -> u64 {
        self.now_epoch_seconds() * 1000
    }
}
