use serde::{Deserialize, Serialize};

// Role stored on the profile record. Clients never write this field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

// Acting role used for gating; guests have no profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorRole {
    Guest,
    User,
    Admin,
}

impl From<Role> for ActorRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ActorRole::User,
            Role::Admin => ActorRole::Admin,
        }
    }
}

// Identity record attached to a session by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

// Provider-issued session. Expiry is owned by the provider; we only read it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: u64,
    pub user: IdentityUser,
}

impl Session {
    pub fn identity_id(&self) -> &str {
        &self.user.id
    }

    pub fn is_expired(&self, now_epoch_seconds: u64) -> bool {
        self.expires_at <= now_epoch_seconds
    }
}

// Kind of provider-pushed session transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

// Transition delivered to session-change subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    pub fn signed_in(session: Session) -> Self {
        Self {
            event: SessionEvent::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            event: SessionEvent::SignedOut,
            session: None,
        }
    }
}

// Application profile enriching an identity with role and display data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_guest: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

// Row inserted when an identity has no profile yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub id: String,
    pub role: Role,
    pub is_guest: bool,
}

impl NewProfile {
    // Default profile for a freshly authenticated identity.
    pub fn for_identity(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            is_guest: false,
        }
    }
}

// Partial profile update. There is deliberately no role field here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_guest: Option<bool>,
}

impl ProfilePatch {
    pub fn guest_flag(is_guest: bool) -> Self {
        Self {
            is_guest: Some(is_guest),
            ..Default::default()
        }
    }

    pub fn username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Default::default()
        }
    }
}

// Outcome of an account registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationRequired,
}

// One entry in the chat log. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub is_user: bool,
    pub timestamp: u64,
}

// Class of a user-visible, non-blocking notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    SessionResolutionError,
    ProfileFetchError,
    InvalidAddress,
    EndpointNotConfigured,
    ConfigurationError,
    NetworkError,
    ServerError,
    MalformedResponse,
    AuthFailed,
    Info,
}

impl NotificationKind {
    pub fn is_error(self) -> bool {
        !matches!(self, NotificationKind::Info)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
