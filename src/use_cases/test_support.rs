use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};
use url::Url;

use crate::domain::entities::{
    IdentityUser, NewProfile, Notification, NotificationKind, Profile, ProfilePatch, Role,
    Session, SessionChange, SignUpOutcome,
};
use crate::domain::errors::{ChatError, IdentityError};
use crate::domain::ports::{
    Clock, IdentityProvider, LocalStore, Notifier, ProfileRepository, QuestionAnswerer,
};

// Shared fixed time source for deterministic use-case tests.
pub(crate) struct FixedClock(pub(crate) u64);

impl Clock for FixedClock {
    fn now_epoch_seconds(&self) -> u64 {
        self.0
    }
}

pub(crate) fn session_for(id: &str) -> Session {
    Session {
        access_token: format!("token-{id}"),
        refresh_token: None,
        expires_at: u64::MAX,
        user: IdentityUser {
            id: id.to_string(),
            email: Some(format!("{id}@uni.example")),
        },
    }
}

pub(crate) fn profile_for(id: &str, role: Role) -> Profile {
    Profile {
        id: id.to_string(),
        role,
        username: None,
        is_guest: false,
        created_at: None,
        updated_at: None,
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct StoreFailures {
    pub get: bool,
    pub set: bool,
    pub remove: bool,
}

// Local key/value store with switchable failures.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    failures: Arc<Mutex<StoreFailures>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_value(self, key: &str, value: &str) -> Self {
        self.values
            .lock()
            .expect("values mutex poisoned")
            .insert(key.to_string(), value.to_string());
        self
    }

    pub(crate) fn set_failures(&self, failures: StoreFailures) {
        *self.failures.lock().expect("failures mutex poisoned") = failures;
    }

    pub(crate) fn raw(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .expect("values mutex poisoned")
            .get(key)
            .cloned()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        if self.failures.lock().expect("failures mutex poisoned").get {
            return Err("get failed".to_string());
        }
        Ok(self.raw(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        if self.failures.lock().expect("failures mutex poisoned").set {
            return Err("set failed".to_string());
        }
        self.values
            .lock()
            .expect("values mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        if self.failures.lock().expect("failures mutex poisoned").remove {
            return Err("remove failed".to_string());
        }
        self.values
            .lock()
            .expect("values mutex poisoned")
            .remove(key);
        Ok(())
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct IdentityFailures {
    pub session: bool,
    pub fetch: bool,
    pub insert: bool,
    // Insert reports success without storing anything.
    pub insert_drops_row: bool,
    pub update: bool,
    pub sign_in: bool,
    pub sign_out: bool,
}

// In-memory identity provider and profile table used across use-case tests.
#[derive(Clone)]
pub(crate) struct FakeIdentity {
    session: Arc<Mutex<Option<Session>>>,
    profiles: Arc<Mutex<HashMap<String, Profile>>>,
    fetch_gates: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
    failures: Arc<Mutex<IdentityFailures>>,
    events: broadcast::Sender<SessionChange>,
    pub(crate) fetch_calls: Arc<AtomicUsize>,
    pub(crate) insert_calls: Arc<AtomicUsize>,
    pub(crate) updates: Arc<Mutex<Vec<(String, ProfilePatch)>>>,
}

impl FakeIdentity {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: Arc::new(Mutex::new(None)),
            profiles: Arc::new(Mutex::new(HashMap::new())),
            fetch_gates: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(IdentityFailures::default())),
            events,
            fetch_calls: Arc::new(AtomicUsize::new(0)),
            insert_calls: Arc::new(AtomicUsize::new(0)),
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn with_session(self, session: Session) -> Self {
        *self.session.lock().expect("session mutex poisoned") = Some(session);
        self
    }

    pub(crate) fn with_profile(self, profile: Profile) -> Self {
        self.profiles
            .lock()
            .expect("profiles mutex poisoned")
            .insert(profile.id.clone(), profile);
        self
    }

    pub(crate) fn set_failures(&self, failures: IdentityFailures) {
        *self.failures.lock().expect("failures mutex poisoned") = failures;
    }

    fn failures(&self) -> IdentityFailures {
        *self.failures.lock().expect("failures mutex poisoned")
    }

    // Blocks fetches for `id` until the returned handle is notified.
    pub(crate) fn hold_fetch(&self, id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.fetch_gates
            .lock()
            .expect("gates mutex poisoned")
            .insert(id.to_string(), gate.clone());
        gate
    }

    pub(crate) fn profile(&self, id: &str) -> Option<Profile> {
        self.profiles
            .lock()
            .expect("profiles mutex poisoned")
            .get(id)
            .cloned()
    }

    pub(crate) fn profile_count(&self) -> usize {
        self.profiles.lock().expect("profiles mutex poisoned").len()
    }

    pub(crate) fn emit(&self, change: SessionChange) {
        let _ = self.events.send(change);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn current_session(&self) -> Result<Option<Session>, IdentityError> {
        if self.failures().session {
            return Err(IdentityError::Unreachable("connection refused".to_string()));
        }
        Ok(self.session.lock().expect("session mutex poisoned").clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<Session, IdentityError> {
        if self.failures().sign_in {
            return Err(IdentityError::InvalidCredentials);
        }
        let id = email.split('@').next().unwrap_or(email);
        let session = session_for(id);
        *self.session.lock().expect("session mutex poisoned") = Some(session.clone());
        self.emit(SessionChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<SignUpOutcome, IdentityError> {
        if self.failures().sign_in {
            return Err(IdentityError::Rejected {
                status: 422,
                message: "weak password".to_string(),
            });
        }
        Ok(SignUpOutcome::ConfirmationRequired)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if self.failures().sign_out {
            return Err(IdentityError::Unreachable("connection reset".to_string()));
        }
        *self.session.lock().expect("session mutex poisoned") = None;
        self.emit(SessionChange::signed_out());
        Ok(())
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> Result<String, IdentityError> {
        Ok(format!("https://identity.example/authorize?provider={provider}"))
    }

    async fn complete_oauth_callback(&self, callback_url: &str) -> Result<Session, IdentityError> {
        if !callback_url.contains("access_token=") {
            return Err(IdentityError::InvalidCallback("missing access_token".to_string()));
        }
        let session = session_for("oauth-user");
        *self.session.lock().expect("session mutex poisoned") = Some(session.clone());
        Ok(session)
    }
}

#[async_trait]
impl ProfileRepository for FakeIdentity {
    async fn fetch(&self, id: &str) -> Result<Option<Profile>, IdentityError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .fetch_gates
            .lock()
            .expect("gates mutex poisoned")
            .remove(id);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failures().fetch {
            return Err(IdentityError::Unreachable("fetch failed".to_string()));
        }
        Ok(self.profile(id))
    }

    async fn insert(&self, profile: NewProfile) -> Result<(), IdentityError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let failures = self.failures();
        if failures.insert {
            return Err(IdentityError::Rejected {
                status: 500,
                message: "insert failed".to_string(),
            });
        }
        if failures.insert_drops_row {
            return Ok(());
        }
        let mut profiles = self.profiles.lock().expect("profiles mutex poisoned");
        if profiles.contains_key(&profile.id) {
            return Err(IdentityError::Conflict);
        }
        profiles.insert(
            profile.id.clone(),
            Profile {
                id: profile.id,
                role: profile.role,
                username: None,
                is_guest: profile.is_guest,
                created_at: None,
                updated_at: None,
            },
        );
        Ok(())
    }

    async fn update(&self, id: &str, patch: ProfilePatch) -> Result<(), IdentityError> {
        if self.failures().update {
            return Err(IdentityError::Rejected {
                status: 500,
                message: "update failed".to_string(),
            });
        }
        self.updates
            .lock()
            .expect("updates mutex poisoned")
            .push((id.to_string(), patch.clone()));
        let mut profiles = self.profiles.lock().expect("profiles mutex poisoned");
        if let Some(profile) = profiles.get_mut(id) {
            if let Some(username) = patch.username {
                profile.username = Some(username);
            }
            if let Some(is_guest) = patch.is_guest {
                profile.is_guest = is_guest;
            }
        }
        Ok(())
    }
}

// Notifier that keeps everything it was asked to show.
#[derive(Clone, Default)]
pub(crate) struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn kinds(&self) -> Vec<NotificationKind> {
        self.seen
            .lock()
            .expect("notifications mutex poisoned")
            .iter()
            .map(|n| n.kind)
            .collect()
    }

    pub(crate) fn count(&self, kind: NotificationKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .expect("notifications mutex poisoned")
            .push(notification);
    }
}

// Answerer that replays queued results and records every request.
#[derive(Clone, Default)]
pub(crate) struct ScriptedAnswerer {
    replies: Arc<Mutex<VecDeque<Result<String, ChatError>>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl ScriptedAnswerer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, result: Result<String, ChatError>) -> Self {
        self.replies
            .lock()
            .expect("replies mutex poisoned")
            .push_back(result);
        self
    }

    // Holds the next call open until the returned handle is notified.
    pub(crate) fn hold_next(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().expect("gate mutex poisoned") = Some(gate.clone());
        gate
    }

    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait]
impl QuestionAnswerer for ScriptedAnswerer {
    async fn answer(&self, endpoint: &Url, question: &str) -> Result<String, ChatError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push((endpoint.to_string(), question.to_string()));
        let gate = self.gate.lock().expect("gate mutex poisoned").take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.replies
            .lock()
            .expect("replies mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }
}
