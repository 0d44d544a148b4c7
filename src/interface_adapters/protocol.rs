use serde::{Deserialize, Serialize};

use crate::domain::entities::IdentityUser;

// Body POSTed to the answering endpoint.
#[derive(Debug, Serialize)]
pub struct AnswerRequest<'a> {
    pub question: &'a str,
}

// Reply fields accepted from the answering endpoint, in priority order.
pub const REPLY_FIELDS: [&str; 4] = ["output", "response", "answer", "message"];

#[derive(Debug, Serialize)]
pub struct PasswordGrantRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshGrantRequest<'a> {
    pub refresh_token: &'a str,
}

// Token payload returned by the identity service on sign in, sign up and refresh.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub expires_at: Option<u64>,
    pub user: IdentityUser,
}

// Sign-up answers with a token payload, or with the bare user when the
// account still needs email confirmation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(TokenResponse),
    Pending(IdentityUser),
}

// Error envelope. Different identity endpoints fill different fields.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .filter(|message| !message.trim().is_empty())
    }
}
