//! HTTP API
//!
//! `POST /api/chat` relays a conversation and streams the reply back.

mod handlers;
mod types;

pub use handlers::create_router;
pub use types::ErrorResponse;

use crate::relay::Relay;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub body_limit: usize,
}

impl AppState {
    pub fn new(relay: Relay, body_limit: usize) -> Self {
        Self {
            relay: Arc::new(relay),
            body_limit,
        }
    }
}
