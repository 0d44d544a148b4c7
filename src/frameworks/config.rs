use std::env;
use std::path::PathBuf;

// Runtime settings read from the environment (optionally seeded from `.env`).

pub fn identity_service_url() -> String {
    env::var("IDENTITY_SERVICE_URL").unwrap_or_else(|_| "http://127.0.0.1:54321".to_string())
}

pub fn identity_api_key() -> String {
    env::var("IDENTITY_API_KEY").unwrap_or_default()
}

pub fn oauth_redirect_url() -> Option<String> {
    env::var("OAUTH_REDIRECT_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
}

pub fn local_state_path() -> PathBuf {
    env::var("LOCAL_STATE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("campus_assistant_state.toml"))
}

pub fn json_logs() -> bool {
    matches!(env::var("LOG_FORMAT").as_deref(), Ok("json"))
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub identity_service_url: String,
    pub identity_api_key: String,
    pub oauth_redirect_url: Option<String>,
    pub local_state_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            identity_service_url: identity_service_url(),
            identity_api_key: identity_api_key(),
            oauth_redirect_url: oauth_redirect_url(),
            local_state_path: local_state_path(),
        }
    }
}
