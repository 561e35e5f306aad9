//! Store Assistant
//!
//! Answers a shop owner's natural-language questions about their WooCommerce
//! store. Questions are routed to a fixed catalog of data tools, either by a
//! keyword dispatcher or by a function-calling chat model, and the answer can
//! be streamed back chunk by chunk.

pub mod agentic;
pub mod assistant;
pub mod config;
pub mod error;
pub mod history;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

pub use assistant::{AssistantReply, StoreAssistant};
pub use config::{AssistantBackend, AssistantConfig};
pub use error::{AssistantError, Result};
