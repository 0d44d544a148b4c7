// Domain layer: identity, chat and notification types plus the capability ports.

pub mod entities;
pub mod errors;
pub mod navigation;
pub mod ports;

pub use entities::{
    ActorRole, ChatMessage, IdentityUser, NewProfile, Notification, NotificationKind, Profile,
    ProfilePatch, Role, Session, SessionChange, SessionEvent, SignUpOutcome,
};
pub use errors::{AccountError, ChatError, ConfigError, IdentityError, ResolveError};
pub use navigation::Destination;
pub use ports::{Clock, IdentityProvider, LocalStore, Notifier, ProfileRepository, QuestionAnswerer};
