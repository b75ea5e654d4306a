//! HTTP request handlers

use super::types::ErrorResponse;
use super::AppState;
use crate::data_stream::{self, StreamPart};
use crate::llm::{LlmEvent, LlmStream};
use crate::relay::RelayError;
use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;

const DATA_STREAM_HEADER: HeaderName = HeaderName::from_static(data_stream::HEADER_NAME);

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.body_limit;
    Router::new()
        .route("/api/chat", post(chat))
        .route("/version", get(get_version))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ============================================================
// Chat relay
// ============================================================

/// The body is taken raw so malformed JSON maps to our own 400 shape
/// instead of the extractor's rejection. A missing credential is reported
/// ahead of any body rejection, including the size limit.
async fn chat(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, Response> {
    state
        .relay
        .ensure_configured()
        .map_err(IntoResponse::into_response)?;
    let body = body.map_err(|rejection| {
        tracing::warn!(status = rejection.status().as_u16(), "Chat body rejected");
        rejection.into_response()
    })?;
    let events = state
        .relay
        .handle(&body)
        .await
        .map_err(IntoResponse::into_response)?;
    let message_id = format!("msg-{}", uuid::Uuid::new_v4());

    Ok((
        [
            (header::CONTENT_TYPE, data_stream::CONTENT_TYPE),
            (DATA_STREAM_HEADER, data_stream::HEADER_VALUE),
        ],
        Body::from_stream(encode_frames(message_id, events)),
    )
        .into_response())
}

/// Frame provider events as they arrive. A failure becomes the final frame.
///
/// If the caller disconnects, axum drops this stream and with it the
/// upstream provider connection.
fn encode_frames(
    message_id: String,
    events: LlmStream,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    let start = stream::once(async move { StreamPart::Start { message_id } });

    let body = events.scan(false, |failed, event| {
        let part = if *failed {
            None
        } else {
            Some(match event {
                Ok(LlmEvent::TextDelta(text)) => StreamPart::Text(text),
                Ok(LlmEvent::Finish { reason, usage }) => StreamPart::Finish { reason, usage },
                Err(e) => {
                    *failed = true;
                    StreamPart::Error(e.message)
                }
            })
        };
        futures::future::ready(part)
    });

    start.chain(body).map(|part| Ok(part.encode()))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("neuraldeep ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            RelayError::Configuration | RelayError::Provider(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        match &self {
            RelayError::Configuration => {
                tracing::error!("GOOGLE_GENERATIVE_AI_API_KEY is not set");
            }
            RelayError::InvalidInput { reason } => {
                tracing::warn!(reason = %reason, "Rejected chat request");
            }
            RelayError::Provider(e) => {
                tracing::error!(error = %e.message, kind = e.kind.as_str(), "Chat relay failed");
            }
        }

        let body = Json(ErrorResponse::new(self.to_string()).with_details(self.details()));
        (status, body).into_response()
    }
}
