use tokio::sync::watch;

use crate::domain::entities::{ActorRole, Role};
use crate::domain::navigation::Destination;
use crate::use_cases::role_resolver::ResolverState;

/// What a guarded view should do for the current identity state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Identity still resolving: show a neutral placeholder, never redirect.
    Placeholder,
    Render,
    Redirect(Destination),
}

/// Guard in front of a protected view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessGate {
    required_role: Option<Role>,
}

impl AccessGate {
    // Gate open to any resolved actor, guests included.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requiring(role: Role) -> Self {
        Self {
            required_role: Some(role),
        }
    }

    pub fn required_role(&self) -> Option<Role> {
        self.required_role
    }

    // Rule order matters: the guest check must run before the anonymous check.
    pub fn evaluate(&self, state: &ResolverState) -> GateDecision {
        if state.is_loading() {
            return GateDecision::Placeholder;
        }

        if self.required_role.is_none() && matches!(state, ResolverState::Guest) {
            return GateDecision::Render;
        }

        if matches!(state, ResolverState::Anonymous) {
            return GateDecision::Redirect(Destination::SignIn);
        }

        if let Some(required) = self.required_role {
            if state.role() != Some(ActorRole::from(required)) {
                return GateDecision::Redirect(Destination::Home);
            }
        }

        GateDecision::Render
    }

    /// Waits for resolution to finish, then decides.
    ///
    /// If the resolver goes away while still loading the gate fails closed.
    pub async fn settle(&self, states: &mut watch::Receiver<ResolverState>) -> GateDecision {
        match states.wait_for(|state| !state.is_loading()).await {
            Ok(state) => self.evaluate(&state),
            Err(_) => GateDecision::Redirect(Destination::SignIn),
        }
    }
}
