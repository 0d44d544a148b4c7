// Session/role state machine: Unresolved -> Loading -> {Authenticated, Guest, Anonymous}.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::entities::{
    ActorRole, NewProfile, Profile, ProfilePatch, Session, SessionChange,
};
use crate::domain::errors::{IdentityError, ResolveError};
use crate::domain::navigation::Destination;
use crate::domain::ports::{IdentityProvider, Notifier, ProfileRepository};
use crate::use_cases::session_store::SessionStore;

// Number of default-profile inserts attempted before giving up on a missing profile.
pub const PROFILE_INSERT_RETRIES: u32 = 1;

/// Resolved identity state observed by access gates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolverState {
    /// Nothing has been asked of the provider yet.
    Unresolved,
    /// Session or profile resolution is outstanding.
    Loading,
    Authenticated(Profile),
    Guest,
    Anonymous,
}

impl ResolverState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ResolverState::Unresolved | ResolverState::Loading)
    }

    /// Acting role, or `None` while loading or anonymous.
    pub fn role(&self) -> Option<ActorRole> {
        match self {
            ResolverState::Authenticated(profile) => Some(profile.role.into()),
            ResolverState::Guest => Some(ActorRole::Guest),
            _ => None,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            ResolverState::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }
}

/// Fetches the profile for `identity_id`, creating a default one if missing.
///
/// The insert is attempted at most [`PROFILE_INSERT_RETRIES`] times; an insert
/// that conflicts with a concurrently created row is treated as success and the
/// row is re-read. A profile record is never created when one already exists.
pub async fn resolve_profile(
    profiles: &dyn ProfileRepository,
    identity_id: &str,
) -> Result<Profile, ResolveError> {
    let mut inserts = 0;
    loop {
        let fetched = profiles
            .fetch(identity_id)
            .await
            .map_err(ResolveError::ProfileFetch)?;

        if let Some(profile) = fetched {
            if profile.id != identity_id {
                return Err(ResolveError::IdentityMismatch);
            }
            return Ok(profile);
        }

        if inserts >= PROFILE_INSERT_RETRIES {
            return Err(ResolveError::ProfileMissing);
        }
        inserts += 1;

        debug!(identity_id, "profile missing, creating default");
        match profiles.insert(NewProfile::for_identity(identity_id)).await {
            Ok(()) | Err(IdentityError::Conflict) => {}
            Err(err) => return Err(ResolveError::ProfileFetch(err)),
        }
    }
}

/// Single source of truth for "who is acting".
///
/// Every session change bumps a generation counter; profile resolutions that
/// finish after a newer change started are dropped instead of overwriting it.
pub struct RoleResolver {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    sessions: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<ResolverState>,
    generation: AtomicU64,
}

impl RoleResolver {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileRepository>,
        sessions: Arc<SessionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state, _) = watch::channel(ResolverState::Unresolved);
        Self {
            identity,
            profiles,
            sessions,
            notifier,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResolverState> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn role(&self) -> Option<ActorRole> {
        self.state.borrow().role()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile().cloned()
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Resolves the persisted session once at startup.
    #[tracing::instrument(name = "resolve_startup_session", skip_all)]
    pub async fn start(&self) {
        let generation = self.next_generation();
        self.set_state(ResolverState::Loading);

        match self.identity.current_session().await {
            Ok(Some(session)) => self.apply_session(session).await,
            Ok(None) => {
                if self.is_current(generation) {
                    self.sessions.replace(None).await;
                    self.settle_without_session();
                }
            }
            Err(err) => {
                // Guest and anonymous flows keep working without the provider.
                warn!(error = %err, "identity provider unreachable");
                self.notifier
                    .notify(ResolveError::SessionResolution(err).notification());
                if self.is_current(generation) {
                    self.settle_without_session();
                }
            }
        }
    }

    /// Applies one provider-pushed transition.
    pub async fn handle_change(&self, change: SessionChange) {
        debug!(event = ?change.event, "session change");
        match change.session {
            Some(session) => {
                if self.is_applied(&session).await {
                    debug!("session already applied");
                    return;
                }
                self.apply_session(session).await;
            }
            None => {
                self.next_generation();
                self.sessions.replace(None).await;
                self.settle_without_session();
            }
        }
    }

    /// Spawns the subscription loop. Aborting the handle unsubscribes.
    pub fn listen(self: Arc<Self>, mut changes: broadcast::Receiver<SessionChange>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => self.handle_change(change).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session changes lagged, re-resolving");
                        self.start().await;
                    }
                    Err(RecvError::Closed) => {
                        debug!("session change stream closed");
                        break;
                    }
                }
            }
        })
    }

    /// Enters guest mode. A resolved profile is flagged best-effort; from any
    /// other state the resolver moves straight to `Guest`.
    pub async fn continue_as_guest(&self) -> Destination {
        self.sessions.set_guest_marker();

        let signed_in = self.state.borrow().profile().map(|profile| profile.id.clone());
        match signed_in {
            Some(identity_id) => {
                match self
                    .profiles
                    .update(&identity_id, ProfilePatch::guest_flag(true))
                    .await
                {
                    Ok(()) => {
                        self.state.send_modify(|state| {
                            if let ResolverState::Authenticated(profile) = state {
                                profile.is_guest = true;
                            }
                        });
                    }
                    Err(err) => {
                        warn!(%identity_id, error = %err, "failed to update guest status");
                    }
                }
            }
            None => {
                self.next_generation();
                self.set_state(ResolverState::Guest);
            }
        }

        info!("continuing as guest");
        Destination::Chat
    }

    /// Drops local identity state after an explicit sign-out.
    pub async fn mark_signed_out(&self) {
        self.next_generation();
        self.sessions.replace(None).await;
        self.sessions.clear_guest_marker();
        self.set_state(ResolverState::Anonymous);
    }

    /// Re-reads the profile of the signed-in user.
    ///
    /// Unlike a session change this leaves the guest marker and the profile's
    /// guest flag alone, and a failure keeps the last known profile.
    pub async fn refresh_profile(&self) {
        let resolved = self.state.borrow().profile().is_some();
        if !resolved {
            return;
        }
        let Some(session) = self.sessions.session().await else {
            return;
        };
        let generation = self.generation.load(Ordering::SeqCst);

        match resolve_profile(self.profiles.as_ref(), session.identity_id()).await {
            Ok(profile) if self.is_current(generation) => {
                self.set_state(ResolverState::Authenticated(profile));
            }
            Ok(_) => debug!(generation, "discarding stale profile refresh"),
            Err(err) => {
                warn!(error = %err, "profile refresh failed");
                self.notifier.notify(err.notification());
            }
        }
    }

    // The session is already held and either resolved or being resolved.
    async fn is_applied(&self, session: &Session) -> bool {
        let tracked = match &*self.state.borrow() {
            ResolverState::Loading => true,
            ResolverState::Authenticated(profile) => profile.id == session.identity_id(),
            _ => false,
        };
        tracked && self.sessions.session().await.as_ref() == Some(session)
    }

    #[tracing::instrument(
        name = "apply_session",
        skip_all,
        fields(identity_id = %session.identity_id())
    )]
    async fn apply_session(&self, session: Session) {
        let generation = self.next_generation();
        let identity_id = session.identity_id().to_string();

        self.sessions.clear_guest_marker();
        self.sessions.replace(Some(session)).await;
        self.set_state(ResolverState::Loading);

        let result = resolve_profile(self.profiles.as_ref(), &identity_id).await;

        if !self.is_current(generation) {
            debug!(generation, "discarding stale profile resolution");
            return;
        }

        match result {
            Ok(mut profile) => {
                if profile.is_guest {
                    match self
                        .profiles
                        .update(&identity_id, ProfilePatch::guest_flag(false))
                        .await
                    {
                        Ok(()) => profile.is_guest = false,
                        Err(err) => warn!(error = %err, "failed to clear profile guest flag"),
                    }
                    if !self.is_current(generation) {
                        return;
                    }
                }
                info!(role = ?profile.role, "profile resolved");
                self.set_state(ResolverState::Authenticated(profile));
            }
            Err(err) => {
                error!(error = %err, "profile resolution failed");
                self.notifier.notify(err.notification());
                self.set_state(ResolverState::Anonymous);
            }
        }
    }

    fn settle_without_session(&self) {
        let next = if self.sessions.is_guest() {
            ResolverState::Guest
        } else {
            ResolverState::Anonymous
        };
        self.set_state(next);
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_state(&self, next: ResolverState) {
        debug!(state = ?next, "resolver state");
        self.state.send_replace(next);
    }
}
