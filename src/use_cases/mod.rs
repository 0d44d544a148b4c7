pub mod access_gate;
pub mod account;
pub mod chat;
pub mod endpoint_config;
pub mod role_resolver;
pub mod session_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use access_gate::{AccessGate, GateDecision};
pub use account::AccountService;
pub use chat::{ChatPipeline, GREETING, SubmitOutcome};
pub use endpoint_config::{EndpointConfigStore, validate_address};
pub use role_resolver::{ResolverState, RoleResolver, resolve_profile};
pub use session_store::SessionStore;
