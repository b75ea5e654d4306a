//! NeuralDeep - streaming chat relay with optional PDF grounding
//!
//! The server half relays a conversation to Gemini and streams the reply
//! back as a data stream; the client half keeps the conversation state and
//! extracts document text locally.

#![allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

pub mod api;
pub mod client;
pub mod config;
pub mod conversation;
pub mod data_stream;
pub mod document;
pub mod framing;
pub mod llm;
pub mod prompt;
pub mod relay;
