use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::entities::{
    IdentityUser, NewProfile, Profile, ProfilePatch, Session, SessionChange, SessionEvent,
    SignUpOutcome,
};
use crate::domain::errors::IdentityError;
use crate::domain::ports::{Clock, IdentityProvider, LocalStore, ProfileRepository};
use crate::interface_adapters::protocol::{
    ErrorResponse, PasswordGrantRequest, RefreshGrantRequest, SignUpResponse, TokenResponse,
};

// Local key holding the serialized session between runs.
pub const SESSION_KEY: &str = "auth_session";

const CHANGE_CAPACITY: usize = 16;
const PROFILES_PATH: &str = "/rest/v1/profiles";

// Connection settings for the hosted identity and profile service.
#[derive(Clone, Debug)]
pub struct IdentitySettings {
    pub base_url: String,
    pub api_key: String,
    pub redirect_url: Option<String>,
}

/// REST client for the hosted identity service and its `profiles` table.
///
/// Owns the current session: it is cached in memory, mirrored to the local
/// store under [`SESSION_KEY`], and every transition is pushed to subscribers.
pub struct RestIdentityClient {
    http: Client,
    base_url: String,
    api_key: String,
    redirect_url: Option<String>,
    local: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
    session: RwLock<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,
}

impl RestIdentityClient {
    pub fn new(
        settings: IdentitySettings,
        local: Arc<dyn LocalStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            http: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
            redirect_url: settings.redirect_url,
            local,
            clock,
            session: RwLock::new(None),
            changes,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn profile_url(&self, id: &str) -> Result<Url, IdentityError> {
        Url::parse_with_params(&self.url(PROFILES_PATH), &[("id", format!("eq.{id}"))])
            .map_err(|err| IdentityError::Decode(format!("invalid profile url: {err}")))
    }

    fn api_headers(&self, bearer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", value);
        }
        let token = bearer.unwrap_or(&self.api_key);
        if !token.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    // Profile requests run as the signed-in user when there is one.
    async fn bearer(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    fn session_from_token(&self, token: TokenResponse) -> Session {
        let expires_at = token.expires_at.unwrap_or_else(|| {
            self.clock.now_epoch_seconds() + token.expires_in.unwrap_or(0)
        });
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        }
    }

    async fn establish(&self, session: Session, event: SessionEvent) {
        match serde_json::to_string(&session) {
            Ok(encoded) => {
                if let Err(err) = self.local.set(SESSION_KEY, &encoded) {
                    warn!(error = %err, "failed to persist session");
                }
            }
            Err(err) => warn!(error = %err, "failed to encode session"),
        }
        *self.session.write().await = Some(session.clone());
        info!(identity_id = %session.identity_id(), ?event, "session established");
        let _ = self.changes.send(SessionChange {
            event,
            session: Some(session),
        });
    }

    async fn forget(&self) {
        if let Err(err) = self.local.remove(SESSION_KEY) {
            warn!(error = %err, "failed to clear persisted session");
        }
        *self.session.write().await = None;
    }

    fn load_persisted(&self) -> Result<Option<Session>, IdentityError> {
        let Some(raw) = self.local.get(SESSION_KEY).map_err(IdentityError::Storage)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                warn!(error = %err, "discarding unreadable persisted session");
                let _ = self.local.remove(SESSION_KEY);
                Ok(None)
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        let res = self
            .http
            .post(self.url("/auth/v1/token?grant_type=refresh_token"))
            .headers(self.api_headers(None))
            .json(&RefreshGrantRequest { refresh_token })
            .send()
            .await
            .map_err(unreachable)?;
        let token: TokenResponse = read_json(res).await?;
        Ok(self.session_from_token(token))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<IdentityUser, IdentityError> {
        let res = self
            .http
            .get(self.url("/auth/v1/user"))
            .headers(self.api_headers(Some(access_token)))
            .send()
            .await
            .map_err(unreachable)?;
        read_json(res).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, IdentityError> {
        let res = request.send().await.map_err(unreachable)?;
        if res.status().is_success() {
            return Ok(res);
        }
        Err(rejected(res).await)
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityClient {
    #[tracing::instrument(name = "current_session", skip_all)]
    async fn current_session(&self) -> Result<Option<Session>, IdentityError> {
        let cached = self.session.read().await.clone();
        let session = match cached {
            Some(session) => Some(session),
            None => self.load_persisted()?,
        };
        let Some(session) = session else {
            return Ok(None);
        };

        if !session.is_expired(self.clock.now_epoch_seconds()) {
            *self.session.write().await = Some(session.clone());
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            debug!("persisted session expired without refresh token");
            self.forget().await;
            return Ok(None);
        };

        match self.refresh(&refresh_token).await {
            Ok(refreshed) => {
                self.establish(refreshed.clone(), SessionEvent::TokenRefreshed)
                    .await;
                Ok(Some(refreshed))
            }
            Err(IdentityError::Unreachable(message)) => Err(IdentityError::Unreachable(message)),
            Err(err) => {
                warn!(error = %err, "session refresh rejected");
                self.forget().await;
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    #[tracing::instrument(name = "sign_in_with_password", skip_all)]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let res = self
            .http
            .post(self.url("/auth/v1/token?grant_type=password"))
            .headers(self.api_headers(None))
            .json(&PasswordGrantRequest { email, password })
            .send()
            .await
            .map_err(unreachable)?;

        if matches!(
            res.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            return Err(IdentityError::InvalidCredentials);
        }

        let token: TokenResponse = read_json(res).await?;
        let session = self.session_from_token(token);
        self.establish(session.clone(), SessionEvent::SignedIn).await;
        Ok(session)
    }

    #[tracing::instrument(name = "sign_up", skip_all)]
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, IdentityError> {
        let res = self
            .http
            .post(self.url("/auth/v1/signup"))
            .headers(self.api_headers(None))
            .json(&PasswordGrantRequest { email, password })
            .send()
            .await
            .map_err(unreachable)?;

        match read_json::<SignUpResponse>(res).await? {
            SignUpResponse::Session(token) => {
                let session = self.session_from_token(token);
                self.establish(session.clone(), SessionEvent::SignedIn).await;
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpResponse::Pending(user) => {
                info!(identity_id = %user.id, "sign up awaiting email confirmation");
                Ok(SignUpOutcome::ConfirmationRequired)
            }
        }
    }

    #[tracing::instrument(name = "sign_out", skip_all)]
    async fn sign_out(&self) -> Result<(), IdentityError> {
        if let Some(token) = self.bearer().await {
            let res = self
                .http
                .post(self.url("/auth/v1/logout"))
                .headers(self.api_headers(Some(&token)))
                .send()
                .await
                .map_err(unreachable)?;
            let status = res.status();
            // An already revoked token still means the user is signed out.
            if !status.is_success()
                && !matches!(status, StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND)
            {
                return Err(rejected(res).await);
            }
        }

        self.forget().await;
        info!("signed out");
        let _ = self.changes.send(SessionChange::signed_out());
        Ok(())
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> Result<String, IdentityError> {
        let mut params = vec![("provider", provider)];
        if let Some(redirect) = self.redirect_url.as_deref() {
            params.push(("redirect_to", redirect));
        }
        let url = Url::parse_with_params(&self.url("/auth/v1/authorize"), &params)
            .map_err(|err| IdentityError::Decode(format!("invalid authorize url: {err}")))?;
        Ok(url.into())
    }

    #[tracing::instrument(name = "complete_oauth_callback", skip_all)]
    async fn complete_oauth_callback(&self, callback_url: &str) -> Result<Session, IdentityError> {
        let callback = parse_callback(callback_url)?;
        let user = self.fetch_user(&callback.access_token).await?;
        let expires_at = callback.expires_at.unwrap_or_else(|| {
            self.clock.now_epoch_seconds() + callback.expires_in.unwrap_or(0)
        });
        let session = Session {
            access_token: callback.access_token,
            refresh_token: callback.refresh_token,
            expires_at,
            user,
        };
        self.establish(session.clone(), SessionEvent::SignedIn).await;
        Ok(session)
    }
}

#[async_trait]
impl ProfileRepository for RestIdentityClient {
    #[tracing::instrument(name = "fetch_profile", skip(self))]
    async fn fetch(&self, id: &str) -> Result<Option<Profile>, IdentityError> {
        let bearer = self.bearer().await;
        let res = self
            .send(
                self.http
                    .get(self.profile_url(id)?)
                    .headers(self.api_headers(bearer.as_deref())),
            )
            .await?;
        let rows: Vec<Profile> = res
            .json()
            .await
            .map_err(|err| IdentityError::Decode(err.to_string()))?;
        Ok(rows.into_iter().next())
    }

    #[tracing::instrument(name = "insert_profile", skip_all, fields(identity_id = %profile.id))]
    async fn insert(&self, profile: NewProfile) -> Result<(), IdentityError> {
        let bearer = self.bearer().await;
        self.send(
            self.http
                .post(self.url(PROFILES_PATH))
                .headers(self.api_headers(bearer.as_deref()))
                .header("Prefer", "return=minimal")
                .json(&profile),
        )
        .await
        .map(|_| ())
    }

    #[tracing::instrument(name = "update_profile", skip(self, patch))]
    async fn update(&self, id: &str, patch: ProfilePatch) -> Result<(), IdentityError> {
        let bearer = self.bearer().await;
        self.send(
            self.http
                .patch(self.profile_url(id)?)
                .headers(self.api_headers(bearer.as_deref()))
                .header("Prefer", "return=minimal")
                .json(&patch),
        )
        .await
        .map(|_| ())
    }
}

// Tokens handed back in the fragment of an OAuth redirect.
#[derive(Debug, PartialEq, Eq)]
struct OAuthCallback {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    expires_at: Option<u64>,
}

fn parse_callback(callback_url: &str) -> Result<OAuthCallback, IdentityError> {
    let url = Url::parse(callback_url)
        .map_err(|err| IdentityError::InvalidCallback(err.to_string()))?;
    // Implicit flow puts tokens in the fragment; errors may arrive in the query.
    let params = url
        .fragment()
        .map(|fragment| url::form_urlencoded::parse(fragment.as_bytes()))
        .into_iter()
        .flatten()
        .chain(url.query_pairs())
        .map(|(key, value)| (key.into_owned(), value.into_owned()));

    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_in = None;
    let mut expires_at = None;
    let mut error = None;
    for (key, value) in params {
        match key.as_str() {
            "access_token" => access_token = Some(value),
            "refresh_token" => refresh_token = Some(value),
            "expires_in" => expires_in = value.parse().ok(),
            "expires_at" => expires_at = value.parse().ok(),
            "error_description" => error = Some(value),
            "error" if error.is_none() => error = Some(value),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(IdentityError::InvalidCallback(error));
    }
    let access_token = access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| IdentityError::InvalidCallback("missing access token".to_string()))?;

    Ok(OAuthCallback {
        access_token,
        refresh_token,
        expires_in,
        expires_at,
    })
}

fn unreachable(err: reqwest::Error) -> IdentityError {
    IdentityError::Unreachable(err.to_string())
}

async fn rejected(res: Response) -> IdentityError {
    let status = res.status();
    if status == StatusCode::CONFLICT {
        return IdentityError::Conflict;
    }
    let message = res
        .json::<ErrorResponse>()
        .await
        .ok()
        .and_then(ErrorResponse::into_message)
        .unwrap_or_else(|| status.to_string());
    IdentityError::Rejected {
        status: status.as_u16(),
        message,
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, IdentityError> {
    if !res.status().is_success() {
        return Err(rejected(res).await);
    }
    res.json::<T>()
        .await
        .map_err(|err| IdentityError::Decode(err.to_string()))
}
