//! Incremental wire format of the relay response
//!
//! One frame per line, `<code>:<json>\n`:
//!
//! | code | payload                                   |
//! |------|-------------------------------------------|
//! | `f`  | `{"messageId": "..."}`                    |
//! | `0`  | text fragment (JSON string)               |
//! | `3`  | error message (JSON string), last frame   |
//! | `d`  | `{"finishReason": ..., "usage": {...}}`   |
//!
//! Readers skip codes they do not know.

use crate::llm::{FinishReason, Usage};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Response header announcing the format
pub const HEADER_NAME: &str = "x-vercel-ai-data-stream";
pub const HEADER_VALUE: &str = "v1";
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    Start { message_id: String },
    Text(String),
    Error(String),
    Finish { reason: FinishReason, usage: Usage },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame has no type prefix: {0:?}")]
    MissingPrefix(String),
    #[error("frame `{code}` has an invalid payload: {source}")]
    Payload {
        code: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPayload {
    message_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishPayload {
    #[serde(default)]
    finish_reason: FinishReason,
    #[serde(default)]
    usage: Usage,
}

impl StreamPart {
    /// Render as one newline-terminated frame.
    pub fn encode(&self) -> String {
        let (code, payload) = match self {
            Self::Start { message_id } => ('f', json!({ "messageId": message_id })),
            Self::Text(text) => ('0', Value::String(text.clone())),
            Self::Error(message) => ('3', Value::String(message.clone())),
            Self::Finish { reason, usage } => (
                'd',
                json!({ "finishReason": reason, "usage": usage }),
            ),
        };
        format!("{code}:{payload}\n")
    }

    /// Parse one line. Blank lines and unknown codes yield `None`.
    pub fn decode(line: &str) -> Result<Option<Self>, DecodeError> {
        if line.trim().is_empty() {
            return Ok(None);
        }
        let (code, payload) = line
            .split_once(':')
            .ok_or_else(|| DecodeError::MissingPrefix(line.to_string()))?;
        let wrap = |source: serde_json::Error| DecodeError::Payload {
            code: code.to_string(),
            source,
        };

        let part = match code {
            "f" => {
                let start: StartPayload = serde_json::from_str(payload).map_err(wrap)?;
                Self::Start {
                    message_id: start.message_id,
                }
            }
            "0" => Self::Text(serde_json::from_str(payload).map_err(wrap)?),
            "3" => Self::Error(serde_json::from_str(payload).map_err(wrap)?),
            "d" => {
                let finish: FinishPayload = serde_json::from_str(payload).map_err(wrap)?;
                Self::Finish {
                    reason: finish.finish_reason,
                    usage: finish.usage,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(part))
    }
}
