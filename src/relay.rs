//! Prompt composer and streaming relay
//!
//! Validates an incoming chat request, prepends the system prompt and
//! forwards the conversation to the completion provider. The provider's
//! stream is passed through as it arrives, bounded by a wall-clock budget
//! that covers the whole request. Nothing is retried.

use crate::config::RelaySettings;
use crate::llm::{LlmError, LlmMessage, LlmRequest, LlmService, LlmStream};
use crate::prompt;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

/// Body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<LlmMessage>,
    #[serde(rename = "pdfContent", skip_serializing_if = "Option::is_none")]
    pub pdf_content: Option<String>,
}

impl ChatRequest {
    /// Parse a raw request body.
    ///
    /// `messages` must be present and an array of `{role, content}`;
    /// `pdfContent` may be absent, null or a string.
    pub fn from_body(body: &[u8]) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| RelayError::invalid_input(format!("Body is not valid JSON: {e}")))?;

        let messages = match value.get("messages") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    LlmMessage::deserialize(item)
                        .map_err(|e| RelayError::invalid_input(format!("messages[{i}]: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(RelayError::invalid_input("`messages` must be an array")),
            None => return Err(RelayError::invalid_input("`messages` is required")),
        };

        let pdf_content = match value.get("pdfContent") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(_) => return Err(RelayError::invalid_input("`pdfContent` must be a string")),
        };

        Ok(Self {
            messages,
            pdf_content,
        })
    }
}

/// Relay failure taxonomy
#[derive(Debug, Error)]
pub enum RelayError {
    /// Provider credential absent. Never carries the credential itself.
    #[error("Server configuration error: Google AI API key is missing.")]
    Configuration,
    #[error("Invalid messages format")]
    InvalidInput { reason: String },
    #[error("Failed to process your request")]
    Provider(#[from] LlmError),
}

impl RelayError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Diagnostic text shown alongside the short message
    pub fn details(&self) -> String {
        match self {
            Self::Configuration => "Please ensure GOOGLE_GENERATIVE_AI_API_KEY is set in your environment variables.".to_string(),
            Self::InvalidInput { reason } => reason.clone(),
            Self::Provider(e) => e.message.clone(),
        }
    }
}

/// Stateless across requests; cheap to share.
pub struct Relay {
    service: Option<Arc<dyn LlmService>>,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(service: Option<Arc<dyn LlmService>>, settings: RelaySettings) -> Self {
        Self { service, settings }
    }

    /// Handle a raw request body end to end.
    ///
    /// The credential check runs before the body is even parsed.
    pub async fn handle(&self, body: &[u8]) -> Result<LlmStream, RelayError> {
        let deadline = Instant::now() + self.settings.timeout;
        let service = self.service()?;
        let request = ChatRequest::from_body(body)?;
        self.dispatch(service, &request, deadline).await
    }

    /// Fails with the configuration error when no credential was supplied.
    pub fn ensure_configured(&self) -> Result<(), RelayError> {
        self.service().map(|_| ())
    }

    fn service(&self) -> Result<&dyn LlmService, RelayError> {
        self.service.as_deref().ok_or(RelayError::Configuration)
    }

    /// Compose the provider request: one fresh system message, then the
    /// caller's messages in their original order.
    pub fn compose(&self, request: &ChatRequest) -> LlmRequest {
        LlmRequest {
            messages: prompt::compose(&request.messages, request.pdf_content.as_deref()),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }

    async fn dispatch(
        &self,
        service: &dyn LlmService,
        request: &ChatRequest,
        deadline: Instant,
    ) -> Result<LlmStream, RelayError> {
        let llm_request = self.compose(request);
        tracing::info!(
            model = %service.model_id(),
            messages = request.messages.len(),
            has_document = request.pdf_content.as_deref().is_some_and(|t| !t.is_empty()),
            "Relaying chat request"
        );

        let budget = self.settings.timeout;
        let stream = tokio::time::timeout_at(deadline, service.stream(&llm_request))
            .await
            .map_err(|_| LlmError::timeout(budget))??;

        Ok(with_deadline(stream, deadline, budget))
    }
}

/// End the stream with a timeout error once `deadline` passes.
fn with_deadline(stream: LlmStream, deadline: Instant, budget: std::time::Duration) -> LlmStream {
    futures::stream::unfold(Some(stream), move |state| async move {
        let mut stream = state?;
        match tokio::time::timeout_at(deadline, stream.next()).await {
            Ok(Some(Ok(event))) => Some((Ok(event), Some(stream))),
            Ok(Some(Err(e))) => Some((Err(e), None)),
            Ok(None) => None,
            Err(_) => {
                tracing::warn!(budget_secs = budget.as_secs(), "Relay time budget exhausted mid-stream");
                Some((Err(LlmError::timeout(budget)), None))
            }
        }
    })
    .boxed()
}
