//! Mock provider for testing
//!
//! Replays scripted streams and records every request it receives.

use super::{FinishReason, LlmError, LlmEvent, LlmRequest, LlmService, LlmStream, Usage};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;

/// What the mock does for one request
pub enum Script {
    /// Yield these chunks then finish normally
    Chunks(Vec<String>),
    /// Yield these chunks then never produce anything again
    ChunksThenHang(Vec<String>),
    /// Yield these chunks then fail mid-stream
    ChunksThenError(Vec<String>, LlmError),
    /// Fail before streaming starts
    Reject(LlmError),
    /// Never answer the dispatch
    Hang,
}

pub struct MockLlmService {
    scripts: Mutex<VecDeque<Script>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmService {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(script: Script) -> Self {
        let mock = Self::new();
        mock.queue(script);
        mock
    }

    pub fn queue(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn text_events(chunks: Vec<String>) -> Vec<Result<LlmEvent, LlmError>> {
    chunks.into_iter().map(|c| Ok(LlmEvent::TextDelta(c))).collect()
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Chunks(vec![]));

        match script {
            Script::Chunks(chunks) => {
                let mut events = text_events(chunks);
                events.push(Ok(LlmEvent::Finish {
                    reason: FinishReason::Stop,
                    usage: Usage {
                        prompt_tokens: 10,
                        completion_tokens: 2,
                    },
                }));
                Ok(futures::stream::iter(events).boxed())
            }
            Script::ChunksThenHang(chunks) => Ok(futures::stream::iter(text_events(chunks))
                .chain(futures::stream::pending())
                .boxed()),
            Script::ChunksThenError(chunks, error) => {
                let mut events = text_events(chunks);
                events.push(Err(error));
                Ok(futures::stream::iter(events).boxed())
            }
            Script::Reject(error) => Err(error),
            Script::Hang => futures::future::pending().await,
        }
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}
