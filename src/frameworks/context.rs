// Bootstrap for the embedded client core.

use std::io::Result;
use std::sync::{Arc, Once};

use tokio::task::JoinHandle;
use url::Url;

use crate::domain::entities::Role;
use crate::domain::ports::{
    Clock, IdentityProvider, LocalStore, Notifier, ProfileRepository, QuestionAnswerer,
};
use crate::frameworks::config::{self, AppConfig};
use crate::interface_adapters::clients::identity::IdentitySettings;
use crate::interface_adapters::clients::{HttpAnswerClient, RestIdentityClient};
use crate::interface_adapters::local_store::TomlFileStore;
use crate::interface_adapters::notifier::BroadcastNotifier;
use crate::interface_adapters::system::SystemClock;
use crate::use_cases::{
    AccessGate, AccountService, ChatPipeline, EndpointConfigStore, GateDecision, RoleResolver,
    SessionStore,
};

static PANIC_HOOK: Once = Once::new();

// Safe to call more than once; only the first subscriber wins.
pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if config::json_logs() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init();
    }

    PANIC_HOOK.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let backtrace = std::backtrace::Backtrace::capture();
            tracing::error!(%info, ?backtrace, "panic");
        }));
    });
}

/// Wired application services shared by every view.
pub struct AppContext {
    pub resolver: Arc<RoleResolver>,
    pub chat: Arc<ChatPipeline>,
    pub endpoint: Arc<EndpointConfigStore>,
    pub account: Arc<AccountService>,
    pub notifier: BroadcastNotifier,
    startup: JoinHandle<()>,
    listener: JoinHandle<()>,
}

impl AppContext {
    /// Waits for the initial identity resolution, then evaluates the gate.
    pub async fn gate(&self, required_role: Option<Role>) -> GateDecision {
        let gate = match required_role {
            Some(role) => AccessGate::requiring(role),
            None => AccessGate::new(),
        };
        let mut states = self.resolver.subscribe();
        gate.settle(&mut states).await
    }

    /// Stops the session listener. Pending resolution is abandoned.
    pub fn shutdown(self) {
        self.startup.abort();
        self.listener.abort();
        tracing::info!("client core stopped");
    }
}

/// Reads configuration from the environment and wires the default adapters.
pub async fn launch() -> Result<AppContext> {
    init_runtime();
    bootstrap(AppConfig::from_env()).await
}

pub async fn bootstrap(config: AppConfig) -> Result<AppContext> {
    Url::parse(&config.identity_service_url).map_err(|e| {
        std::io::Error::other(format!(
            "invalid identity service url `{}`: {e}",
            config.identity_service_url
        ))
    })?;

    let local: Arc<dyn LocalStore> = Arc::new(
        TomlFileStore::open(&config.local_state_path)
            .map_err(|e| std::io::Error::other(format!("failed to open local state: {e}")))?,
    );
    tracing::debug!(
        identity_service_url = %config.identity_service_url,
        local_state_path = %config.local_state_path.display(),
        "client core configured"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let identity = Arc::new(RestIdentityClient::new(
        IdentitySettings {
            base_url: config.identity_service_url,
            api_key: config.identity_api_key,
            redirect_url: config.oauth_redirect_url,
        },
        local.clone(),
        clock.clone(),
    ));
    let notifier = BroadcastNotifier::new();

    Ok(assemble(
        identity.clone(),
        identity,
        Arc::new(HttpAnswerClient::new()),
        local,
        clock,
        notifier,
    ))
}

/// Wires services over arbitrary adapters and starts identity resolution.
pub fn assemble(
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    answerer: Arc<dyn QuestionAnswerer>,
    local: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
    notifier: BroadcastNotifier,
) -> AppContext {
    let shared_notifier: Arc<dyn Notifier> = Arc::new(notifier.clone());

    let sessions = Arc::new(SessionStore::new(local.clone()));
    let resolver = Arc::new(RoleResolver::new(
        identity.clone(),
        profiles.clone(),
        sessions,
        shared_notifier.clone(),
    ));
    let endpoint = Arc::new(EndpointConfigStore::new(local, shared_notifier.clone()));
    let chat = Arc::new(ChatPipeline::new(
        answerer,
        endpoint.clone(),
        shared_notifier.clone(),
        clock,
    ));
    let account = Arc::new(AccountService::new(
        identity.clone(),
        profiles,
        resolver.clone(),
        shared_notifier,
    ));

    // Subscribe before resolving so no transition falls between the two.
    let listener = resolver.clone().listen(identity.subscribe());
    let startup = {
        let resolver = resolver.clone();
        tokio::spawn(async move { resolver.start().await })
    };

    AppContext {
        resolver,
        chat,
        endpoint,
        account,
        notifier,
        startup,
        listener,
    }
}
