// Chat dispatch: one typed question becomes one request and at most one reply.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::domain::entities::ChatMessage;
use crate::domain::errors::ChatError;
use crate::domain::ports::{Clock, Notifier, QuestionAnswerer};
use crate::use_cases::endpoint_config::EndpointConfigStore;

// Synthetic assistant message that opens every conversation.
pub const GREETING: &str = "Hello! How can I assist you today?";

/// Result of one `submit` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty or whitespace-only input; nothing happened.
    Ignored,
    /// Another submission is still in flight.
    Busy,
    Answered(ChatMessage),
    /// The failure was already surfaced as a notification.
    Failed(ChatError),
}

// Clears the sending flag however the submission ends.
struct SendingGuard<'a> {
    flag: &'a watch::Sender<bool>,
}

impl<'a> SendingGuard<'a> {
    fn acquire(flag: &'a watch::Sender<bool>) -> Option<Self> {
        let acquired = flag.send_if_modified(|sending| {
            if *sending {
                return false;
            }
            *sending = true;
            true
        });
        acquired.then_some(Self { flag })
    }
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}

pub struct ChatPipeline {
    answerer: Arc<dyn QuestionAnswerer>,
    endpoint: Arc<EndpointConfigStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    messages: RwLock<Vec<ChatMessage>>,
    input: Mutex<String>,
    sending: watch::Sender<bool>,
}

impl ChatPipeline {
    pub fn new(
        answerer: Arc<dyn QuestionAnswerer>,
        endpoint: Arc<EndpointConfigStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let greeting = ChatMessage {
            id: "welcome".to_string(),
            text: GREETING.to_string(),
            is_user: false,
            timestamp: clock.now_epoch_millis(),
        };
        let (sending, _) = watch::channel(false);
        Self {
            answerer,
            endpoint,
            notifier,
            clock,
            messages: RwLock::new(vec![greeting]),
            input: Mutex::new(String::new()),
            sending,
        }
    }

    // Snapshot of the log in display order.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub fn is_sending(&self) -> bool {
        *self.sending.borrow()
    }

    // Receiver for the "thinking" indicator.
    pub fn subscribe_sending(&self) -> watch::Receiver<bool> {
        self.sending.subscribe()
    }

    pub async fn input(&self) -> String {
        self.input.lock().await.clone()
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        *self.input.lock().await = text.into();
    }

    /// Submits the current input buffer.
    pub async fn submit_input(&self) -> SubmitOutcome {
        let text = self.input().await;
        self.submit(&text).await
    }

    /// Sends `text` to the configured endpoint.
    ///
    /// The user message is appended before the request goes out. On success one
    /// assistant message follows and the input buffer is cleared; on failure the
    /// log is left as is, the input keeps `text`, and a notification is raised.
    /// Calls made while a request is in flight are rejected, not queued.
    #[tracing::instrument(name = "chat_submit", skip_all, fields(len = text.len()))]
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let question = text.trim();
        if question.is_empty() {
            return SubmitOutcome::Ignored;
        }

        let Some(_sending) = SendingGuard::acquire(&self.sending) else {
            debug!("submission rejected, request already in flight");
            return SubmitOutcome::Busy;
        };

        self.append(question, true).await;

        match self.dispatch(question).await {
            Ok(reply) => {
                let message = self.append(&reply, false).await;
                self.input.lock().await.clear();
                info!("reply received");
                SubmitOutcome::Answered(message)
            }
            Err(err) => {
                warn!(error = %err, "chat submission failed");
                self.notifier.notify(err.notification());
                *self.input.lock().await = text.to_string();
                SubmitOutcome::Failed(err)
            }
        }
    }

    async fn dispatch(&self, question: &str) -> Result<String, ChatError> {
        let address = self.endpoint.get().ok_or(ChatError::EndpointNotConfigured)?;
        let endpoint =
            Url::parse(&address).map_err(|err| ChatError::Configuration(err.to_string()))?;
        debug!(endpoint = %endpoint, "dispatching question");
        self.answerer.answer(&endpoint, question).await
    }

    async fn append(&self, text: &str, is_user: bool) -> ChatMessage {
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            is_user,
            timestamp: self.clock.now_epoch_millis(),
        };
        self.messages.write().await.push(message.clone());
        message
    }
}
