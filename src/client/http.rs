//! HTTP client for `POST /api/chat`

use super::{ChunkStream, RelayClient, RelayClientError};
use crate::api::ErrorResponse;
use crate::data_stream::StreamPart;
use crate::framing::LineBuffer;
use crate::relay::ChatRequest;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use std::collections::VecDeque;
use std::time::Duration;

pub struct HttpRelayClient {
    client: Client,
    endpoint: String,
}

impl HttpRelayClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: &str) -> Result<Self, RelayClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn send(&self, request: &ChatRequest) -> Result<ChunkStream, RelayClientError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (error, details) = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(parsed) => (parsed.error, parsed.details),
                Err(_) => (format!("HTTP {status}"), Some(body).filter(|b| !b.is_empty())),
            };
            tracing::warn!(status = status.as_u16(), error = %error, "Relay rejected request");
            return Err(RelayClientError::Rejected {
                status: status.as_u16(),
                error,
                details,
            });
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();
        Ok(decode_chunks(bytes))
    }
}

/// Decode a data-stream body into text fragments.
///
/// Ends after the finish frame, an error frame, or the end of the body.
pub fn decode_chunks(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> ChunkStream {
    let state = DecodeState {
        bytes,
        lines: LineBuffer::new(),
        pending: VecDeque::new(),
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
                    for line in st.lines.push(&chunk) {
                        st.accept(&line);
                    }
                }
                Some(Err(e)) => {
                    st.pending.push_back(Err(RelayClientError::Transport(e)));
                    st.done = true;
                }
                None => {
                    if let Some(line) = st.lines.finish() {
                        st.accept(&line);
                    }
                    st.done = true;
                }
            }
        }
    })
    .boxed()
}

struct DecodeState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    lines: LineBuffer,
    pending: VecDeque<Result<String, RelayClientError>>,
    done: bool,
}

impl DecodeState {
    fn accept(&mut self, line: &str) {
        if self.done {
            return;
        }
        match StreamPart::decode(line) {
            Ok(Some(StreamPart::Text(text))) => {
                if !text.is_empty() {
                    self.pending.push_back(Ok(text));
                }
            }
            Ok(Some(StreamPart::Error(message))) => {
                self.pending.push_back(Err(RelayClientError::Stream(message)));
                self.done = true;
            }
            Ok(Some(StreamPart::Finish { reason, usage })) => {
                tracing::debug!(finish_reason = ?reason, output_tokens = usage.completion_tokens, "Reply finished");
                self.done = true;
            }
            Ok(Some(StreamPart::Start { .. }) | None) => {}
            Err(e) => {
                self.pending.push_back(Err(e.into()));
                self.done = true;
            }
        }
    }
}
