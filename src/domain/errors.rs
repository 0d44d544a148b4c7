use thiserror::Error;

use crate::domain::entities::{Notification, NotificationKind};

// Failures reported by the identity provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("record already exists")]
    Conflict,
    #[error("identity provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid oauth callback: {0}")]
    InvalidCallback(String),
    #[error("identity response decode error: {0}")]
    Decode(String),
    #[error("local session storage error: {0}")]
    Storage(String),
}

// Failures while deriving the acting role.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("failed to resolve session: {0}")]
    SessionResolution(IdentityError),
    #[error("failed to fetch user profile: {0}")]
    ProfileFetch(IdentityError),
    #[error("profile still missing after creation")]
    ProfileMissing,
    #[error("profile id does not match session identity")]
    IdentityMismatch,
}

impl ResolveError {
    pub fn notification(&self) -> Notification {
        match self {
            ResolveError::SessionResolution(_) => Notification::new(
                NotificationKind::SessionResolutionError,
                "Failed to connect to the identity provider",
            ),
            ResolveError::ProfileFetch(_)
            | ResolveError::ProfileMissing
            | ResolveError::IdentityMismatch => Notification::new(
                NotificationKind::ProfileFetchError,
                "Failed to fetch user profile",
            ),
        }
    }
}

// Failures of the endpoint configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid endpoint address: {0}")]
    InvalidAddress(String),
    #[error("failed to persist endpoint address: {0}")]
    Storage(String),
}

impl ConfigError {
    pub fn notification(&self) -> Notification {
        match self {
            ConfigError::InvalidAddress(_) => Notification::new(
                NotificationKind::InvalidAddress,
                "Please enter a valid URL for the answering endpoint",
            ),
            ConfigError::Storage(_) => {
                Notification::new(NotificationKind::ConfigurationError, self.to_string())
            }
        }
    }
}

// Failure classes of a chat submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("answering endpoint is not configured")]
    EndpointNotConfigured,
    #[error("answering endpoint address is malformed: {0}")]
    Configuration(String),
    #[error("unable to reach answering endpoint: {0}")]
    Network(String),
    #[error("answering endpoint error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("invalid response from answering endpoint: {0}")]
    MalformedResponse(String),
}

impl ChatError {
    pub fn kind(&self) -> NotificationKind {
        match self {
            ChatError::EndpointNotConfigured => NotificationKind::EndpointNotConfigured,
            ChatError::Configuration(_) => NotificationKind::ConfigurationError,
            ChatError::Network(_) => NotificationKind::NetworkError,
            ChatError::Server { .. } => NotificationKind::ServerError,
            ChatError::MalformedResponse(_) => NotificationKind::MalformedResponse,
        }
    }

    pub fn notification(&self) -> Notification {
        let message = match self {
            ChatError::EndpointNotConfigured => {
                "The answering endpoint is not set. Please configure it in settings.".to_string()
            }
            other => other.to_string(),
        };
        Notification::new(self.kind(), message)
    }
}

// Failures of explicit account actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("no active session")]
    NotSignedIn,
    #[error(transparent)]
    Identity(#[from] IdentityError),
}
