//! Client-side conversation state machine
//!
//! A single owned `Conversation` holds the message log, the idle/streaming
//! flag and the attached document. `ChatSession` drives it against a relay.

mod message;
mod notice;
#[cfg(test)]
mod proptests;
mod session;
mod state;

pub use message::{Message, Role};
pub use notice::{Notice, Severity};
pub use session::ChatSession;
pub use state::{
    AttachedDocument, Conversation, ConversationError, ConversationStats, StreamOutcome,
    StreamState,
};
