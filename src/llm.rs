//! LLM provider abstraction
//!
//! A provider accepts a role/content message list and streams text back.
//! Nothing else about the provider leaks past this module.

mod config;
mod error;
mod gemini;
#[cfg(test)]
pub mod testing;
mod types;

pub use config::{LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{LlmError, LlmErrorKind};
pub use gemini::GeminiService;
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Incremental completion output. Finite and not restartable.
pub type LlmStream = BoxStream<'static, Result<LlmEvent, LlmError>>;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Dispatch a request and return the stream of generated output.
    ///
    /// Errors returned here happen before any output was produced; errors
    /// yielded by the stream happen mid-generation.
    async fn stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError> {
        let start = Instant::now();
        let result = self.inner.stream(request).await;

        match result {
            Ok(stream) => {
                tracing::debug!(
                    model = %self.model_id,
                    messages = request.messages.len(),
                    first_byte_ms = %start.elapsed().as_millis(),
                    "LLM stream opened"
                );
                let model_id = self.model_id.clone();
                Ok(stream
                    .inspect(move |event| match event {
                        Ok(LlmEvent::Finish { reason, usage }) => {
                            tracing::info!(
                                model = %model_id,
                                duration_ms = %start.elapsed().as_millis(),
                                finish_reason = ?reason,
                                input_tokens = usage.prompt_tokens,
                                output_tokens = usage.completion_tokens,
                                "LLM stream completed"
                            );
                        }
                        Ok(LlmEvent::TextDelta(_)) => {}
                        Err(e) => {
                            tracing::error!(
                                model = %model_id,
                                duration_ms = %start.elapsed().as_millis(),
                                error = %e.message,
                                kind = e.kind.as_str(),
                                "LLM stream failed"
                            );
                        }
                    })
                    .boxed())
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "LLM request failed"
                );
                Err(e)
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
