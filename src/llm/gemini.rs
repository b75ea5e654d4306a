//! Google Gemini provider implementation (streaming)

use super::types::{FinishReason, LlmEvent, LlmRequest, MessageRole, Usage};
use super::{LlmError, LlmService, LlmStream};
use crate::framing::SseDecoder;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    url: String,
    model_id: String,
}

impl GeminiService {
    pub fn new(api_key: String, model: &str, base_url: &str) -> Result<Self, LlmError> {
        let url = format!(
            "{}/v1beta/models/{model}:streamGenerateContent?alt=sse",
            base_url.trim_end_matches('/'),
        );

        // The relay enforces the overall time budget; this only bounds
        // connection setup.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            url,
            model_id: model.to_string(),
        })
    }

    fn translate_request(request: &LlmRequest) -> GeminiRequest {
        let system_text = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let system_instruction = (!system_text.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: system_text }],
        });

        let contents = request
            .messages
            .iter()
            .filter_map(|msg| {
                let role = match msg.role {
                    MessageRole::System => return None,
                    MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                };
                Some(GeminiContent {
                    role: Some(role.to_string()),
                    parts: vec![GeminiPart {
                        text: msg.content.clone(),
                    }],
                })
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError> {
        let gemini_request = Self::translate_request(request);

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .header("accept", "text/event-stream")
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map_or(body, |e| e.error.message);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(decode_events(bytes))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Turn the provider's SSE body into text deltas followed by one `Finish`.
fn decode_events(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> LlmStream {
    let state = StreamState {
        bytes,
        sse: SseDecoder::new(),
        pending: VecDeque::new(),
        finish_reason: FinishReason::Unknown,
        usage: Usage::default(),
        done: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    for data in st.sse.push(&chunk) {
                        st.absorb(&data);
                    }
                }
                Some(Err(e)) => {
                    st.fail(LlmError::network(format!("Stream interrupted: {e}")));
                }
                None => {
                    if let Some(data) = st.sse.finish() {
                        st.absorb(&data);
                    }
                    if !st.done {
                        st.pending.push_back(Ok(LlmEvent::Finish {
                            reason: st.finish_reason,
                            usage: st.usage,
                        }));
                        st.done = true;
                    }
                }
            }
        }
    })
    .boxed()
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    sse: SseDecoder,
    pending: VecDeque<Result<LlmEvent, LlmError>>,
    finish_reason: FinishReason,
    usage: Usage,
    done: bool,
}

impl StreamState {
    fn absorb(&mut self, data: &str) {
        if self.done {
            return;
        }
        match parse_chunk(data) {
            Ok(chunk) => {
                for text in chunk.texts {
                    self.pending.push_back(Ok(LlmEvent::TextDelta(text)));
                }
                if let Some(reason) = chunk.finish_reason {
                    self.finish_reason = reason;
                }
                if let Some(usage) = chunk.usage {
                    self.usage = usage;
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: LlmError) {
        self.pending.push_back(Err(error));
        self.done = true;
    }
}

/// Normalized content of one streamed response chunk
#[derive(Debug, Default, PartialEq)]
struct ParsedChunk {
    texts: Vec<String>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

fn parse_chunk(data: &str) -> Result<ParsedChunk, LlmError> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Ok(ParsedChunk::default());
    }

    if let Ok(error_resp) = serde_json::from_str::<GeminiErrorResponse>(trimmed) {
        return Err(LlmError::server_error(error_resp.error.message));
    }

    let resp: GeminiStreamChunk = serde_json::from_str(trimmed)
        .map_err(|e| LlmError::unknown(format!("Failed to parse stream chunk: {e} - data: {trimmed}")))?;

    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::content_blocked(format!("Prompt blocked: {reason}")));
    }

    let mut parsed = ParsedChunk::default();
    if let Some(candidate) = resp.candidates.into_iter().next() {
        if let Some(content) = candidate.content {
            parsed.texts = content
                .parts
                .into_iter()
                .map(|p| p.text)
                .filter(|t| !t.is_empty())
                .collect();
        }
        parsed.finish_reason = candidate
            .finish_reason
            .as_deref()
            .map(FinishReason::from_gemini);
    }
    parsed.usage = resp.usage_metadata.map(|u| Usage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
    });
    Ok(parsed)
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
