//! Conversation state and its transitions
//!
//! The log is strictly append-ordered. The only message that changes after
//! being appended is the assistant reply currently being streamed, and its
//! content only grows.

use super::message::{Message, Role};
use super::notice::Notice;
use crate::relay::ChatRequest;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Whether a relay call is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming,
}

/// Extracted text of the document answers are grounded in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedDocument {
    pub filename: String,
    pub text: String,
}

/// Rejected operations. None of them change the conversation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("a reply is still streaming")]
    Busy,
    #[error("The PDF appears to be empty or contains no readable text.")]
    EmptyDocument,
}

impl ConversationError {
    /// Empty input and busy submits are silent; an empty document is not.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::EmptyMessage | Self::Busy => None,
            Self::EmptyDocument => Some(Notice::error("Empty PDF", self.to_string())),
        }
    }
}

/// How a stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
    Failed { message: String },
}

impl StreamOutcome {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::Completed | Self::Cancelled => None,
            Self::Failed { message } => Some(Notice::error(
                "Error",
                format!("Failed to send message: {message}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationStats {
    /// Messages the user sent
    pub message_count: usize,
    pub document_loaded: bool,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    state: StreamState,
    /// Index of the assistant message receiving streamed output
    in_flight: Option<usize>,
    document: Option<AttachedDocument>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == StreamState::Streaming
    }

    pub fn document(&self) -> Option<&AttachedDocument> {
        self.document.as_ref()
    }

    /// The assistant message currently being streamed into
    pub fn in_flight(&self) -> Option<&Message> {
        self.in_flight.and_then(|i| self.messages.get(i))
    }

    /// Append a user message and start streaming.
    ///
    /// Returns the request to send: the whole log plus the attached
    /// document's text. An empty assistant message is appended after the
    /// request is built, ready to receive chunks.
    pub fn submit(&mut self, text: &str) -> Result<ChatRequest, ConversationError> {
        if text.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        if self.is_streaming() {
            return Err(ConversationError::Busy);
        }

        self.messages.push(Message::new(Role::User, text));
        let request = ChatRequest {
            messages: self.messages.iter().map(Message::to_llm).collect(),
            pdf_content: self.document.as_ref().map(|d| d.text.clone()),
        };

        self.messages.push(Message::new(Role::Assistant, String::new()));
        self.in_flight = Some(self.messages.len() - 1);
        self.state = StreamState::Streaming;

        tracing::debug!(
            messages = request.messages.len(),
            has_document = request.pdf_content.is_some(),
            "Submitted message"
        );
        Ok(request)
    }

    /// Append streamed output to the in-flight reply.
    ///
    /// Returns `false` (and does nothing) when no stream is in flight.
    pub fn append_chunk(&mut self, chunk: &str) -> bool {
        match self.in_flight.and_then(|i| self.messages.get_mut(i)) {
            Some(reply) => {
                reply.content.push_str(chunk);
                true
            }
            None => false,
        }
    }

    /// End the in-flight stream, whatever the outcome.
    ///
    /// The reply keeps whatever content arrived. A reply that received
    /// nothing is dropped from the log.
    pub fn finish(&mut self, outcome: &StreamOutcome) {
        let Some(index) = self.in_flight.take() else {
            return;
        };
        self.state = StreamState::Idle;

        if self
            .messages
            .get(index)
            .is_some_and(|reply| reply.content.is_empty())
        {
            self.messages.remove(index);
        }

        tracing::debug!(outcome = ?outcome, "Stream finished");
    }

    /// Replace the attached document and announce it in the log.
    pub fn attach_document(
        &mut self,
        filename: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Notice, ConversationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ConversationError::EmptyDocument);
        }
        let filename = filename.into();

        let announcement = format!(
            "📄 PDF \"{filename}\" has been uploaded successfully! I can now answer questions about its content. The document contains {}k characters of text.",
            thousands_rounded(text.encode_utf16().count()),
        );
        self.messages.push(Message::new(Role::Assistant, announcement));

        let notice = Notice::info(
            "PDF uploaded successfully",
            format!("\"{filename}\" is ready for analysis."),
        );
        self.document = Some(AttachedDocument { filename, text });
        Ok(notice)
    }

    /// Clear the attached document. No-op when nothing is attached.
    pub fn detach_document(&mut self) -> Option<Notice> {
        self.document.take()?;
        self.messages.push(Message::new(
            Role::Assistant,
            "📄 PDF has been removed. You can now have a general conversation or upload a new PDF document.",
        ));
        Some(Notice::info(
            "PDF removed",
            "You can now upload a new document or continue chatting.",
        ))
    }

    pub fn stats(&self) -> ConversationStats {
        ConversationStats {
            message_count: self
                .messages
                .iter()
                .filter(|m| m.role == Role::User)
                .count(),
            document_loaded: self.document.is_some(),
            started_at: self.messages.first().map(|m| m.timestamp),
        }
    }
}

/// Character count in thousands, rounded half up. Characters are counted
/// in UTF-16 code units, as browsers count string length.
fn thousands_rounded(chars: usize) -> usize {
    (chars + 500) / 1000
}
