use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::domain::errors::ChatError;
use crate::domain::ports::QuestionAnswerer;
use crate::interface_adapters::protocol::{AnswerRequest, ErrorResponse, REPLY_FIELDS};

// Thin reqwest wrapper that POSTs one question and reads one reply.
#[derive(Clone, Default)]
pub struct HttpAnswerClient {
    http: Client,
}

impl HttpAnswerClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl QuestionAnswerer for HttpAnswerClient {
    #[tracing::instrument(name = "answer", skip_all, fields(endpoint = %endpoint))]
    async fn answer(&self, endpoint: &Url, question: &str) -> Result<String, ChatError> {
        let res = self
            .http
            .post(endpoint.clone())
            .json(&AnswerRequest { question })
            .send()
            .await
            .map_err(|err| {
                if err.is_builder() {
                    ChatError::Configuration(err.to_string())
                } else {
                    ChatError::Network(err.to_string())
                }
            })?;
        let status = res.status();

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(ErrorResponse::into_message)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_default();
            warn!(status = status.as_u16(), %message, "answering endpoint returned error");
            return Err(ChatError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|err| ChatError::Network(err.to_string()))?;
        let payload: Value = serde_json::from_slice(&bytes)
            .map_err(|err| ChatError::MalformedResponse(err.to_string()))?;

        let reply = extract_reply(&payload).ok_or_else(|| {
            ChatError::MalformedResponse("response carries no reply text".to_string())
        })?;
        debug!(reply_len = reply.len(), "answer received");
        Ok(reply)
    }
}

/// Pulls the reply text out of an answering endpoint payload.
///
/// Workflow engines commonly wrap the object in a one-element array, so the
/// first element of an array is inspected as well.
pub fn extract_reply(payload: &Value) -> Option<String> {
    let object = match payload {
        Value::Array(items) => items.first()?.as_object()?,
        other => other.as_object()?,
    };

    REPLY_FIELDS.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
    })
}
