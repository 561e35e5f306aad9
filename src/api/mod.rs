//! REST API for the store assistant
//!
//! Exposes question answering, streamed answers and session history over HTTP.

pub mod chat_routes;

pub use chat_routes::{create_chat_router, ApiError, ChatState};
