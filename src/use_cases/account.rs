use std::sync::Arc;

use tracing::{error, info};

use crate::domain::entities::{
    Notification, NotificationKind, ProfilePatch, Session, SessionChange, SignUpOutcome,
};
use crate::domain::errors::AccountError;
use crate::domain::navigation::Destination;
use crate::domain::ports::{IdentityProvider, Notifier, ProfileRepository};
use crate::use_cases::role_resolver::RoleResolver;

// Explicit credential and profile actions. Failures are surfaced and returned.
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    resolver: Arc<RoleResolver>,
    notifier: Arc<dyn Notifier>,
}

impl AccountService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileRepository>,
        resolver: Arc<RoleResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            identity,
            profiles,
            resolver,
            notifier,
        }
    }

    // Each successful sign-in resolves the profile before the destination is
    // returned; the provider's later push of the same session is ignored.
    #[tracing::instrument(name = "sign_in", skip_all)]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Destination, AccountError> {
        let result = self.try_sign_in(email, password).await;
        self.report(result, "sign in")
    }

    #[tracing::instrument(name = "sign_up", skip_all)]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Destination, AccountError> {
        let result = self.try_sign_up(email, password).await;
        self.report(result, "sign up")
    }

    #[tracing::instrument(name = "sign_out", skip_all)]
    pub async fn sign_out(&self) -> Result<Destination, AccountError> {
        let result = self.identity.sign_out().await.map_err(AccountError::from);
        if result.is_ok() {
            self.resolver.mark_signed_out().await;
        }
        self.report(result.map(|()| Destination::SignIn), "sign out")
    }

    // Returns the authorization address the host should open.
    pub async fn sign_in_with_oauth(&self, provider: &str) -> Result<String, AccountError> {
        let result = self.try_sign_in_with_oauth(provider).await;
        self.report(result, "oauth sign in")
    }

    pub async fn complete_oauth(&self, callback_url: &str) -> Result<Destination, AccountError> {
        let result = self.try_complete_oauth(callback_url).await;
        self.report(result, "oauth callback")
    }

    #[tracing::instrument(name = "update_username", skip_all)]
    pub async fn update_username(&self, username: &str) -> Result<(), AccountError> {
        let result = self.try_update_username(username).await;
        self.report(result, "profile update")
    }

    async fn try_sign_in(&self, email: &str, password: &str) -> Result<Destination, AccountError> {
        let email = validate_credentials(email, password)?;
        let session = self.identity.sign_in_with_password(email, password).await?;
        self.adopt(session).await;
        Ok(Destination::Chat)
    }

    async fn try_sign_up(&self, email: &str, password: &str) -> Result<Destination, AccountError> {
        let email = validate_credentials(email, password)?;
        match self.identity.sign_up(email, password).await? {
            SignUpOutcome::SignedIn(session) => {
                self.adopt(session).await;
                Ok(Destination::Chat)
            }
            SignUpOutcome::ConfirmationRequired => {
                self.notifier.notify(Notification::new(
                    NotificationKind::Info,
                    "Please check your email to confirm your account",
                ));
                Ok(Destination::SignIn)
            }
        }
    }

    async fn try_complete_oauth(&self, callback_url: &str) -> Result<Destination, AccountError> {
        let session = self.identity.complete_oauth_callback(callback_url).await?;
        self.adopt(session).await;
        Ok(Destination::Chat)
    }

    async fn adopt(&self, session: Session) {
        self.resolver
            .handle_change(SessionChange::signed_in(session))
            .await;
    }

    async fn try_sign_in_with_oauth(&self, provider: &str) -> Result<String, AccountError> {
        let provider = provider.trim();
        if provider.is_empty() {
            return Err(AccountError::InvalidInput("oauth provider is required"));
        }
        Ok(self.identity.sign_in_with_oauth(provider).await?)
    }

    async fn try_update_username(&self, username: &str) -> Result<(), AccountError> {
        let username = validate_username(username)?;
        let session = self
            .resolver
            .sessions()
            .session()
            .await
            .ok_or(AccountError::NotSignedIn)?;
        self.profiles
            .update(session.identity_id(), ProfilePatch::username(username))
            .await?;
        self.resolver.refresh_profile().await;
        self.notifier.notify(Notification::new(
            NotificationKind::Info,
            "Profile updated successfully",
        ));
        Ok(())
    }

    fn report<T>(&self, result: Result<T, AccountError>, action: &str) -> Result<T, AccountError> {
        match &result {
            Ok(_) => info!(action, "account action completed"),
            Err(err) => {
                error!(action, error = %err, "account action failed");
                self.notifier
                    .notify(Notification::new(NotificationKind::AuthFailed, err.to_string()));
            }
        }
        result
    }
}

fn validate_credentials<'a>(email: &'a str, password: &str) -> Result<&'a str, AccountError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AccountError::InvalidInput("a valid email is required"));
    }
    if password.is_empty() {
        return Err(AccountError::InvalidInput("password is required"));
    }
    Ok(email)
}

fn validate_username(value: &str) -> Result<&str, AccountError> {
    // Keep names compact and readable in the chat header.
    const MIN_LEN: usize = 3;
    const MAX_LEN: usize = 32;
    const INVALID: AccountError =
        AccountError::InvalidInput("username must be 3-32 letters, digits, spaces, '_' or '-'");

    let len = value.chars().count();
    if !(MIN_LEN..=MAX_LEN).contains(&len) || value.trim() != value {
        return Err(INVALID);
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
    {
        return Err(INVALID);
    }

    Ok(value)
}
