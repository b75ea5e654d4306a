//! Relay client abstraction
//!
//! The conversation driver only needs "send a request, get text fragments
//! back"; this trait lets tests swap the network out.

mod http;

pub use http::HttpRelayClient;

use crate::data_stream::DecodeError;
use crate::relay::ChatRequest;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;

/// Text fragments of one assistant reply, in arrival order
pub type ChunkStream = BoxStream<'static, Result<String, RelayClientError>>;

#[derive(Debug, Error)]
pub enum RelayClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The relay answered with an error body instead of a stream
    #[error("{error}{}", details_suffix(.details.as_deref()))]
    Rejected {
        status: u16,
        error: String,
        details: Option<String>,
    },
    /// The relay reported a failure after streaming began
    #[error("{0}")]
    Stream(String),
    #[error("Malformed response stream: {0}")]
    Decode(#[from] DecodeError),
}

fn details_suffix(details: Option<&str>) -> String {
    details
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Client for the chat relay
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChunkStream, RelayClientError>;
}

#[async_trait]
impl<T: RelayClient + ?Sized> RelayClient for Arc<T> {
    async fn send(&self, request: &ChatRequest) -> Result<ChunkStream, RelayClientError> {
        (**self).send(request).await
    }
}
